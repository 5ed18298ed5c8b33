use crate::store::UpsertOutcome;

/// Counters for one pipeline run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub scraped: usize,
    pub inserted: usize,
    pub updated: usize,
    pub missing: usize,
    pub failed: usize,
    pub duplicates: usize,
}

impl RunStats {
    pub fn record_upsert(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
    }

    pub fn stored(&self) -> usize {
        self.inserted + self.updated
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nSummary:")?;
        writeln!(f, "  Professors scraped:   {}", self.scraped)?;
        writeln!(f, "  Inserted:             {}", self.inserted)?;
        writeln!(f, "  Updated:              {}", self.updated)?;
        writeln!(f, "  Stored:               {}", self.stored())?;
        writeln!(f, "  No rating data:       {}", self.missing)?;
        writeln!(f, "  Failed:               {}", self.failed)?;
        writeln!(f, "  Duplicate names:      {}", self.duplicates)
    }
}
