use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A professor card found on a search results page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessorLink {
    pub name: String,
    pub profile_url: String,
}

impl Display for ProfessorLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} — {}", self.name, self.profile_url)
    }
}

/// How many reviews gave each star rating, 1 through 5.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingDistribution {
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
    pub r4: u32,
    pub r5: u32,
}

impl RatingDistribution {
    pub fn counts(&self) -> [(u8, u32); 5] {
        [
            (1, self.r1),
            (2, self.r2),
            (3, self.r3),
            (4, self.r4),
            (5, self.r5),
        ]
    }

    pub fn total(&self) -> u64 {
        self.counts().iter().map(|(_, c)| u64::from(*c)).sum()
    }
}

impl Display for RatingDistribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (stars, count) in self.counts().iter().rev() {
            writeln!(f, "  {} star: {:>5}", stars, count)?;
        }
        write!(f, "  total:  {:>5}", self.total())
    }
}

/// A row of the `professors` table. `name` is the upsert key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessorRecord {
    pub name: String,
    pub rmp_link: String,
    pub rating_1_count: u32,
    pub rating_2_count: u32,
    pub rating_3_count: u32,
    pub rating_4_count: u32,
    pub rating_5_count: u32,
}

impl ProfessorRecord {
    pub fn new(link: &ProfessorLink, distribution: &RatingDistribution) -> Self {
        Self {
            name: link.name.clone(),
            rmp_link: link.profile_url.clone(),
            rating_1_count: distribution.r1,
            rating_2_count: distribution.r2,
            rating_3_count: distribution.r3,
            rating_4_count: distribution.r4,
            rating_5_count: distribution.r5,
        }
    }
}

impl Display for ProfessorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}/{}/{}/{}/{}] {}",
            self.name,
            self.rating_1_count,
            self.rating_2_count,
            self.rating_3_count,
            self.rating_4_count,
            self.rating_5_count,
            self.rmp_link
        )
    }
}
