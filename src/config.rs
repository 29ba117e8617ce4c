use clap::ValueEnum;
use tracing::warn;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModelChoice {
    #[default]
    FlashLite,
    Flash,
}

impl ModelChoice {
    pub const ALL: [Self; 2] = [Self::FlashLite, Self::Flash];

    pub fn id(self) -> &'static str {
        match self {
            Self::FlashLite => "gemini-2.5-flash-lite",
            Self::Flash => "gemini-2.5-flash",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|choice| choice.id() == id)
    }

    pub fn resolve(id: Option<&str>) -> Self {
        match id {
            None => Self::default(),
            Some(id) => Self::from_id(id).unwrap_or_else(|| {
                let fallback = Self::default();
                warn!(requested = id, fallback = fallback.id(), "unknown model id, using default");
                fallback
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Depth {
    Minimal,
    #[default]
    Moderate,
    Extensive,
}

impl Depth {
    pub const ALL: [Self; 3] = [Self::Minimal, Self::Moderate, Self::Extensive];

    pub fn label(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Moderate => "moderate",
            Self::Extensive => "extensive",
        }
    }

    pub fn pillars(self) -> (u32, u32) {
        match self {
            Self::Minimal => (2, 3),
            Self::Moderate => (3, 5),
            Self::Extensive => (5, 7),
        }
    }

    pub fn details_per_pillar(self) -> (u32, u32) {
        match self {
            Self::Minimal => (1, 2),
            Self::Moderate => (2, 4),
            Self::Extensive => (3, 5),
        }
    }

    pub fn node_range(self) -> (u32, u32) {
        let (min_pillars, max_pillars) = self.pillars();
        let (min_details, max_details) = self.details_per_pillar();
        (
            1 + min_pillars + min_pillars * min_details,
            1 + max_pillars + max_pillars * max_details,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

pub const SAMPLING: Sampling = Sampling {
    temperature: 0.7,
    top_p: 0.95,
    top_k: 40,
};

#[derive(Clone, Debug, Default)]
pub struct Settings {
    pub model: ModelChoice,
    pub depth: Depth,
    pub credential: Option<String>,
}

impl Settings {
    pub fn credential(&self) -> Option<&str> {
        self.credential
            .as_deref()
            .map(str::trim)
            .filter(|credential| !credential.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_model_falls_back_to_default() {
        assert_eq!(ModelChoice::resolve(Some("gpt-whatever")), ModelChoice::FlashLite);
        assert_eq!(ModelChoice::resolve(None), ModelChoice::FlashLite);
        assert_eq!(ModelChoice::resolve(Some("gemini-2.5-flash")), ModelChoice::Flash);
    }

    #[test]
    fn depth_ranges_grow() {
        let minimal = Depth::Minimal.node_range();
        let moderate = Depth::Moderate.node_range();
        let extensive = Depth::Extensive.node_range();
        assert_eq!(moderate, (10, 26));
        assert!(minimal.1 < extensive.1);
        assert!(moderate.0 < extensive.0);
    }

    #[test]
    fn blank_credential_is_absent() {
        let settings = Settings {
            credential: Some("   ".to_owned()),
            ..Settings::default()
        };
        assert_eq!(settings.credential(), None);
    }
}
