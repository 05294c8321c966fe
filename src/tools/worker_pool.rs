use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// 固定大小的工作池
///
/// 任務彼此獨立，結果依提交順序回傳，與完成順序無關。
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(size.max(1))
            .thread_name(|i| format!("highlight-worker-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// 平行執行所有任務，回傳與 `jobs` 相同順序的結果
    pub fn run_all<J, R, F>(&self, jobs: Vec<J>, job_fn: F) -> Vec<R>
    where
        J: Send,
        R: Send,
        F: Fn(J) -> R + Send + Sync,
    {
        self.pool.install(|| {
            jobs.into_par_iter()
                .with_max_len(1)
                .map(job_fn)
                .collect()
        })
    }
}
