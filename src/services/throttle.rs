//! 节流与全局退避 - 业务能力层
//!
//! - `Pacer`：每次尝试之后的随机间隔，不论结果如何
//! - `BackoffGate`：所有工作者共享的退避闸门，任一工作者遇到限流即全体暂停

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, warn};

/// 随机间隔
#[derive(Debug, Clone)]
pub struct Pacer {
    min: Duration,
    max: Duration,
}

impl Pacer {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    /// 在 [min, max] 之间随机取一个间隔
    pub fn next_delay(&self) -> Duration {
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        if max_ms <= min_ms {
            return self.min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    }

    pub async fn pause(&self) -> Duration {
        let delay = self.next_delay();
        if !delay.is_zero() {
            debug!("等待 {:?} (请求间隔)", delay);
            sleep(delay).await;
        }
        delay
    }
}

/// 全局退避闸门
///
/// 闸门关闭期间任何工作者都不能获取新会话。
#[derive(Debug)]
pub struct BackoffGate {
    cooldown: Duration,
    until: Mutex<Option<Instant>>,
    triggers: AtomicUsize,
}

impl BackoffGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            until: Mutex::new(None),
            triggers: AtomicUsize::new(0),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// 触发退避，返回闸门重新打开的时间
    ///
    /// 已经处于退避中时只会把截止时间向后延长，不会缩短。
    pub fn trigger(&self, reason: &str) -> Instant {
        let deadline = Instant::now() + self.cooldown;
        let mut until = self.until.lock().unwrap_or_else(|e| e.into_inner());
        let effective = match *until {
            Some(current) if current >= deadline => current,
            _ => {
                *until = Some(deadline);
                deadline
            }
        };
        self.triggers.fetch_add(1, Ordering::SeqCst);
        warn!("🛑 检测到限流 ({}), 所有工作者暂停 {:?}", reason, self.cooldown);
        effective
    }

    /// 当前退避的截止时间（已过期则为 None）
    pub fn active_until(&self) -> Option<Instant> {
        let until = self.until.lock().unwrap_or_else(|e| e.into_inner());
        until.filter(|t| *t > Instant::now())
    }

    pub fn is_active(&self) -> bool {
        self.active_until().is_some()
    }

    /// 触发过的次数
    pub fn trigger_count(&self) -> usize {
        self.triggers.load(Ordering::SeqCst)
    }

    /// 等待闸门打开，返回实际等待的时间
    pub async fn wait_ready(&self) -> Duration {
        let start = Instant::now();
        while let Some(deadline) = self.active_until() {
            sleep_until(deadline).await;
        }
        start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacer_stays_within_bounds() {
        let pacer = Pacer::new(Duration::from_millis(100), Duration::from_millis(200));
        for _ in 0..100 {
            let d = pacer.next_delay();
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(200));
        }
    }

    #[test]
    fn zero_range_pacer_is_constant() {
        let pacer = Pacer::new(Duration::ZERO, Duration::ZERO);
        assert_eq!(pacer.next_delay(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn gate_blocks_for_cooldown() {
        let gate = BackoffGate::new(Duration::from_secs(30));
        assert!(!gate.is_active());

        gate.trigger("test");
        assert!(gate.is_active());

        let waited = gate.wait_ready().await;
        assert!(waited >= Duration::from_secs(30));
        assert!(!gate.is_active());
        assert_eq!(gate.trigger_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retrigger_extends_deadline() {
        let gate = BackoffGate::new(Duration::from_secs(10));
        let first = gate.trigger("a");
        tokio::time::advance(Duration::from_secs(5)).await;
        let second = gate.trigger("b");
        assert!(second > first);

        let waited = gate.wait_ready().await;
        assert!(waited >= Duration::from_secs(10));
    }
}
