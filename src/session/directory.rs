//! Pseudo-user directory and nickname generation

use rand::Rng;

/// Base nicknames of the pseudo-user directory
pub const NICKNAME_POOL: [&str; 14] = [
    "YellowUmbrella",
    "BlueStar",
    "AcornTalk",
    "WarmTea",
    "DawnBreeze",
    "CityTraveler",
    "ThunderCat",
    "StarMoonlight",
    "PingPong",
    "CremeBrulee",
    "LavenderScent",
    "ButterCookie",
    "RunningWhale",
    "AppleJam",
];

/// Build the pseudo-user directory
///
/// Each base nickname appears as-is, followed by `variants_per_name` numbered
/// variants `<base>#<1000..=9999>`.
pub fn build_directory(variants_per_name: usize) -> Vec<String> {
    let mut rng = rand::thread_rng();
    let mut directory = Vec::with_capacity(NICKNAME_POOL.len() * (variants_per_name + 1));
    for base in NICKNAME_POOL {
        directory.push(base.to_string());
        for _ in 0..variants_per_name {
            directory.push(format!("{}#{}", base, rng.gen_range(1000..=9999)));
        }
    }
    directory
}

/// Generate a random nickname `<base>#<100..=999>`
pub fn random_nickname() -> String {
    let mut rng = rand::thread_rng();
    let base = NICKNAME_POOL[rng.gen_range(0..NICKNAME_POOL.len())];
    format!("{}#{}", base, rng.gen_range(100..=999))
}

/// Result of a directory search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Matching nicknames, in directory order
    Candidates(Vec<String>),
    /// Nothing matched and no keyword was given
    PromptForKeyword,
    /// Nothing matched; the keyword itself may be used as a new nickname
    OfferNewNickname(String),
}

/// Search `directory` for `keyword`
///
/// Matches are case-insensitive substrings of the trimmed keyword. The current
/// user and everyone in `partners` are excluded.
pub fn search(
    directory: &[String],
    keyword: &str,
    current_user: Option<&str>,
    partners: &[&str],
) -> SearchOutcome {
    let keyword = keyword.trim();
    let needle = keyword.to_lowercase();
    let me = current_user.map(str::to_lowercase);

    let candidates: Vec<String> = directory
        .iter()
        .filter(|name| {
            let lower = name.to_lowercase();
            lower.contains(&needle)
                && me.as_deref() != Some(lower.as_str())
                && !partners.iter().any(|p| p.to_lowercase() == lower)
        })
        .cloned()
        .collect();

    if !candidates.is_empty() {
        SearchOutcome::Candidates(candidates)
    } else if keyword.is_empty() {
        SearchOutcome::PromptForKeyword
    } else {
        SearchOutcome::OfferNewNickname(keyword.to_string())
    }
}
