mod model;
mod store;

pub use model::{
    FileAnalysis, HistoryEntry, JobStatus, OptionChange, PaperSize, PrintJob, PrintOptions,
    Quality, StoredFile, Tariff,
};
pub use store::JobStore;
