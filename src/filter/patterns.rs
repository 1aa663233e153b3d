use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Warning,
    Review,
    Important,
    Episode,
}

impl SignalKind {
    pub const ALL: [SignalKind; 4] = [
        SignalKind::Warning,
        SignalKind::Review,
        SignalKind::Important,
        SignalKind::Episode,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SignalKind::Warning => "warning",
            SignalKind::Review => "review",
            SignalKind::Important => "important",
            SignalKind::Episode => "episode",
        }
    }

    fn regex(self) -> &'static Regex {
        match self {
            SignalKind::Warning => &WARNING_REGEX,
            SignalKind::Review => &REVIEW_REGEX,
            SignalKind::Important => &IMPORTANT_REGEX,
            SignalKind::Episode => &EPISODE_REGEX,
        }
    }

    pub fn is_match(self, text: &str) -> bool {
        self.regex().is_match(text)
    }
}

static WARNING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)ネタバレ|結末|最終回|最終話|真相|黒幕|犯人|正体|死亡|spoiler|ending|finale|who dies")
        .expect("valid warning regex")
});
static REVIEW_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)感想|レビュー|考察|解説|反応|まとめ|review|reaction|explained|breakdown|recap")
        .expect("valid review regex")
});
static IMPORTANT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)衝撃|ヤバ[いすぎ]|やば[いすぎ]|まさか|神回|号泣|驚愕|shocking|insane|unbelievable|plot twist|mind.?blowing")
        .expect("valid importance regex")
});
static EPISODE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)第\s*[0-9０-９一二三四五六七八九十百]+\s*[話回章]|\bepisode\s*\d+|\bep\.?\s*\d+|\bs\d+\s*e\d+|#\d+")
        .expect("valid episode regex")
});

/// Signal kinds whose pattern occurs in `text`, in declaration order.
pub fn matching(text: &str) -> Vec<SignalKind> {
    SignalKind::ALL
        .into_iter()
        .filter(|kind| kind.is_match(text))
        .collect()
}
