pub mod coordinator;
pub mod cursor;
pub mod domain;
pub mod media;
pub mod player;
pub mod ports;
pub mod rate;
pub mod reader;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use coordinator::{PresentationMode, SessionAction, SessionCoordinator, SessionSnapshot, SummaryHeader};
pub use cursor::ChapterCursor;
pub use domain::{Author, Chapter, Document};
pub use player::{PlayerAction, PlayerOptions, PlayerPhase, PlayerState};
pub use ports::{EngineSignal, PlaybackEngine, PortError, PortResult, SummarySource};
pub use rate::PlaybackRate;
pub use reader::{ReaderAction, ReaderState, ScrollDirection};
pub use session::{spawn_session, SessionClosed, SessionHandle};
