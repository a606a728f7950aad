pub mod recovery;

pub use recovery::{attach_diagnostic, PanicResponse};
