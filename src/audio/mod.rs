pub mod analyser;
pub mod device;
pub mod ensemble;
pub mod part;
pub mod probe;
pub mod tap;

pub use analyser::SpectrumAnalyser;
pub use ensemble::{Ensemble, PlaybackState, SeekBar};
pub use part::{Part, Track};
pub use tap::{AnalysisTap, Playhead};
