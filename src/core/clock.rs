//! 帧计时

use std::time::Instant;

/// FPS 统计周期（秒）
const REPORT_INTERVAL: f32 = 1.0;

/// 帧计数器
///
/// 累计帧数与时间，每满一秒报告一次帧数并清零。
#[derive(Debug, Clone, Default)]
pub struct FrameCounter {
    frames: u32,
    elapsed: f32,
}

impl FrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一帧，满一秒时返回该秒内的帧数
    pub fn tick(&mut self, dt: f32) -> Option<u32> {
        self.frames += 1;
        self.elapsed += dt;
        if self.elapsed < REPORT_INTERVAL {
            return None;
        }
        let fps = self.frames;
        self.frames = 0;
        self.elapsed -= REPORT_INTERVAL;
        // 长时间卡顿后不连续报告
        if self.elapsed >= REPORT_INTERVAL {
            self.elapsed = 0.0;
        }
        Some(fps)
    }

    /// 窗口标题
    pub fn title(fps: u32) -> String {
        format!("FPS: {}", fps)
    }
}

/// 帧间隔时钟
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// 距上次调用的秒数
    pub fn delta(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        dt
    }
}
