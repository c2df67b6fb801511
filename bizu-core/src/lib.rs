pub mod articles;
pub mod backend;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod likes;
pub mod models;
pub mod rest;
pub mod session;
pub mod storage;
pub mod sweeper;

pub use articles::{can_modify, ArticleStore, AuditStatus, FetchOutcome, UpdateReceipt};
pub use backend::Backend;
pub use cache::{CacheEntry, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::DeskConfig;
pub use error::{BizuError, ConfigError, StorageError};
pub use likes::{LikePhase, LikeState, LikeStore};
pub use models::{Actor, Bizu, BizuId, BizuPatch, EditLog, FetchParams, NewBizu, Profile, Role, UserId};
pub use rest::RestBackend;
pub use session::Session;
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use sweeper::{spawn_sweeper, SweeperHandle};
