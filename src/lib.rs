pub mod classify;
pub mod cli;
pub mod detect;
pub mod ellipse;
pub mod render;

pub use classify::{classify, format_dollars, Denomination, Tally};
pub use cli::Cli;
pub use detect::{detect_shapes, normalize_canvas, CandidateShape};
pub use ellipse::{fit_ellipse, FittedEllipse};
pub use render::annotate;
