#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    LoadingDefinition,
    CheckingCache,
    LoadingCachedResult,
    Building,
    Running,
    SavingResults,
    Completed,
}

impl RunStage {
    pub fn label(self) -> &'static str {
        match self {
            RunStage::LoadingDefinition => "loading",
            RunStage::CheckingCache => "cache",
            RunStage::LoadingCachedResult => "cached",
            RunStage::Building => "building",
            RunStage::Running => "running",
            RunStage::SavingResults => "saving",
            RunStage::Completed => "done",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunProgressEvent {
    pub stage: RunStage,
    /// Timeblocks finished so far, while running.
    pub block: Option<usize>,
    pub num_blocks: usize,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
}

impl RunProgressEvent {
    pub fn stage(stage: RunStage, num_blocks: usize, elapsed_wall_s: f64, message: Option<String>) -> Self {
        Self {
            stage,
            block: None,
            num_blocks,
            elapsed_wall_s,
            message,
        }
    }

    /// Fraction of timeblocks done, when running.
    pub fn fraction_complete(&self) -> Option<f64> {
        let block = self.block?;
        (self.num_blocks > 0).then(|| block as f64 / self.num_blocks as f64)
    }
}
