/// 远端键值存储 (Remote Store)
///
/// 写入为 fire-and-forget: 后台线程排空有界队列, 失败只记录日志
pub mod firebase;

pub use firebase::FirebaseStore;

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, TrySendError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::detection::StoreWrite;

/// 写队列容量, 超出时丢弃新的写入
pub const STORE_QUEUE_CAPACITY: usize = 16;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("存储键为空")]
    EmptyKey,
    #[error("HTTP 请求失败: {0}")]
    Transport(String),
    #[error("JSON 序列化失败: {0}")]
    Json(#[from] serde_json::Error),
}

/// 外部存储契约
pub trait RemoteStore: Send + 'static {
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// 未配置远端时使用, 只记录日志
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStore;

impl RemoteStore for LogStore {
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }
        info!("📝 {} = {}", key, value);
        Ok(())
    }
}

/// 写入调度接口 (检测线程只负责投递)
pub trait StoreSink: Send + Sync {
    fn schedule(&self, write: StoreWrite);
}

/// 后台写线程句柄
pub struct StoreWriter {
    tx: Option<Sender<StoreWrite>>,
    handle: Option<JoinHandle<()>>,
}

impl StoreWriter {
    pub fn spawn<S: RemoteStore>(store: S) -> Self {
        let (tx, rx) = crossbeam_channel::bounded::<StoreWrite>(STORE_QUEUE_CAPACITY);
        let handle = thread::Builder::new()
            .name("remote-store".into())
            .spawn(move || {
                info!("远端存储线程启动");
                for write in rx.iter() {
                    match store.write(&write.key, &write.value) {
                        Ok(()) => debug!("已写入 {} = {}", write.key, write.value),
                        Err(e) => warn!("远端写入失败 ({} = {}): {}", write.key, write.value, e),
                    }
                }
                info!("远端存储线程退出");
            });

        match handle {
            Ok(handle) => Self {
                tx: Some(tx),
                handle: Some(handle),
            },
            Err(e) => {
                warn!("无法启动远端存储线程, 写入将被丢弃: {}", e);
                Self {
                    tx: None,
                    handle: None,
                }
            }
        }
    }

    /// 关闭队列并等待剩余写入完成
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("远端存储线程异常退出");
            }
        }
    }
}

impl StoreSink for StoreWriter {
    fn schedule(&self, write: StoreWrite) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(write) {
            Ok(()) => {}
            Err(TrySendError::Full(w)) => warn!("远端写入队列已满, 丢弃 {} = {}", w.key, w.value),
            Err(TrySendError::Disconnected(w)) => {
                warn!("远端存储线程已退出, 丢弃 {} = {}", w.key, w.value)
            }
        }
    }
}

impl Drop for StoreWriter {
    fn drop(&mut self) {
        self.close();
    }
}
