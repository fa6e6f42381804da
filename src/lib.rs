pub mod api;
pub mod core;

pub use api::{CameraIndexer, FrameSource, RunEnd, RunSummary, SourceFrame};
pub use crate::core::error::{ErrorClass, IndexError, IndexResult};
pub use crate::core::index::IndexerConfig;

/// 初始化日志，重复调用无副作用
pub fn init_logging() {
    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Debug)
                .with_tag("person_index"),
        );
    }

    #[cfg(not(target_os = "android"))]
    {
        // RUST_LOG 可覆盖默认的 info 级别
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init();
    }
}
