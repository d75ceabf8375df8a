//! Machine clock: T-state accounting, the 50 Hz interrupt and real-time
//! pacing.
//!
//! Every executed instruction adds its T-states to a free-running counter.
//! When the counter reaches one frame's worth (`frequency / 50`) the CPU is
//! interrupted, the display is redrawn and the counter keeps the overrun.
//! With a speed limit, the clock then sleeps for whatever is left of the
//! 20 ms frame, scaled by the speed ratio.

use std::time::{Duration, Instant};

use emu_core::{Bus, Cpu, MasterClock, Ticks};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Real-time length of one frame at 50 Hz.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(20);

/// Interrupts per second.
pub const INTERRUPT_RATE: u64 = 50;

/// Data bus value during interrupt acknowledge (floating bus, IM 2 vector).
const INTERRUPT_DATA: u8 = 0xFF;

/// How fast to run relative to real hardware.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedLimit {
    /// Never sleep.
    Unconstrained,
    /// Run at `ratio` times real speed.
    Ratio(f64),
}

impl Default for SpeedLimit {
    fn default() -> Self {
        Self::Ratio(1.0)
    }
}

impl SpeedLimit {
    /// Ratios of zero or below mean "as fast as possible".
    #[must_use]
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.0 {
            Self::Ratio(ratio)
        } else {
            Self::Unconstrained
        }
    }
}

/// A bus that can be told a frame has finished.
pub trait FrameBus: Bus {
    fn end_frame(&mut self);
}

/// Waits out the remainder of a frame.
pub trait Pacer: Send {
    fn pause(&mut self, duration: Duration);
}

/// Sleeps the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

pub struct MachineClock {
    master: MasterClock,
    threshold: Ticks,
    counter: Ticks,
    speed: SpeedLimit,
    last_interrupt: Instant,
    pacer: Box<dyn Pacer>,
}

impl MachineClock {
    #[must_use]
    pub fn new(master: MasterClock) -> Self {
        Self {
            master,
            // Below 50 Hz a frame would round to zero T-states.
            threshold: master.ticks_per_frame(INTERRUPT_RATE).max(Ticks::new(1)),
            counter: Ticks::ZERO,
            speed: SpeedLimit::default(),
            last_interrupt: Instant::now(),
            pacer: Box::new(ThreadPacer),
        }
    }

    #[must_use]
    pub fn master(&self) -> MasterClock {
        self.master
    }

    /// T-states per interrupt.
    #[must_use]
    pub fn interrupt_threshold(&self) -> Ticks {
        self.threshold
    }

    /// T-states since the last interrupt.
    #[must_use]
    pub fn cycles(&self) -> Ticks {
        self.counter
    }

    #[must_use]
    pub fn speed(&self) -> SpeedLimit {
        self.speed
    }

    pub fn set_speed(&mut self, speed: SpeedLimit) {
        self.speed = speed;
    }

    pub fn set_speed_ratio(&mut self, ratio: f64) {
        self.speed = SpeedLimit::from_ratio(ratio);
    }

    /// Replace the pacer and return the old one.
    pub fn set_pacer(&mut self, pacer: Box<dyn Pacer>) -> Box<dyn Pacer> {
        std::mem::replace(&mut self.pacer, pacer)
    }

    /// Zero the counter and restart the pacing reference.
    pub fn reset(&mut self) {
        self.counter = Ticks::ZERO;
        self.last_interrupt = Instant::now();
    }

    /// Execute `instructions` instructions. Returns the number of
    /// interrupts delivered.
    pub fn run<C, B>(&mut self, cpu: &mut C, bus: &mut B, instructions: u64) -> u64
    where
        C: Cpu,
        B: FrameBus,
    {
        let mut interrupts = 0;
        for _ in 0..instructions {
            self.counter += Ticks::from(cpu.execute(bus));
            if self.counter >= self.threshold {
                self.fire(cpu, bus);
                interrupts += 1;
            }
        }
        interrupts
    }

    fn fire<C: Cpu, B: FrameBus>(&mut self, cpu: &mut C, bus: &mut B) {
        let accepted = cpu.interrupt(bus, INTERRUPT_DATA);
        bus.end_frame();
        self.counter %= self.threshold;
        trace!(accepted, overrun = self.counter.get(), "interrupt");

        if let SpeedLimit::Ratio(ratio) = self.speed {
            let remaining = FRAME_INTERVAL.saturating_sub(self.last_interrupt.elapsed());
            if let Ok(wait) = Duration::try_from_secs_f64(remaining.as_secs_f64() / ratio) {
                if !wait.is_zero() {
                    self.pacer.pause(wait);
                }
            }
        }
        self.last_interrupt = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::testing::{ScriptedCpu, TestBus};

    #[derive(Clone, Default)]
    struct RecordingPacer(Arc<Mutex<Vec<Duration>>>);

    impl Pacer for RecordingPacer {
        fn pause(&mut self, duration: Duration) {
            self.0.lock().expect("lock").push(duration);
        }
    }

    #[test]
    fn threshold_is_one_fiftieth_of_frequency() {
        let clock = MachineClock::new(MasterClock::new(3_500_000));
        assert_eq!(clock.interrupt_threshold(), Ticks::new(70_000));
    }

    #[test]
    fn one_interrupt_per_threshold() {
        let mut clock = MachineClock::new(MasterClock::new(3_500_000));
        clock.set_speed(SpeedLimit::Unconstrained);
        let mut cpu = ScriptedCpu::new(4);
        let mut bus = TestBus::default();

        // 17_500 × 4 = 70_000 T-states: exactly one frame.
        assert_eq!(clock.run(&mut cpu, &mut bus, 17_500), 1);
        assert_eq!(clock.cycles(), Ticks::ZERO);
        assert_eq!(cpu.interrupts, vec![0xFF]);
        assert_eq!(bus.frames, 1);

        assert_eq!(clock.run(&mut cpu, &mut bus, 17_499), 0);
        assert_eq!(clock.cycles(), Ticks::new(69_996));
    }

    #[test]
    fn sub_frame_frequency_fires_every_instruction() {
        let mut clock = MachineClock::new(MasterClock::new(10));
        clock.set_speed(SpeedLimit::Unconstrained);
        assert_eq!(clock.interrupt_threshold(), Ticks::new(1));

        let mut cpu = ScriptedCpu::new(4);
        let mut bus = TestBus::default();
        assert_eq!(clock.run(&mut cpu, &mut bus, 3), 3);
        assert_eq!(clock.cycles(), Ticks::ZERO);
    }

    #[test]
    fn overrun_carries_into_next_frame() {
        let mut clock = MachineClock::new(MasterClock::new(3_500_000));
        clock.set_speed(SpeedLimit::Unconstrained);
        let mut cpu = ScriptedCpu::new(23);
        let mut bus = TestBus::default();

        // 3044 × 23 = 70_012.
        assert_eq!(clock.run(&mut cpu, &mut bus, 3_044), 1);
        assert_eq!(clock.cycles(), Ticks::new(12));
    }

    #[test]
    fn unconstrained_never_pauses() {
        let mut clock = MachineClock::new(MasterClock::new(3_500_000));
        let pacer = RecordingPacer::default();
        clock.set_pacer(Box::new(pacer.clone()));
        clock.set_speed_ratio(0.0);
        assert_eq!(clock.speed(), SpeedLimit::Unconstrained);

        let mut cpu = ScriptedCpu::new(4);
        let mut bus = TestBus::default();
        clock.run(&mut cpu, &mut bus, 17_500 * 3);
        assert!(pacer.0.lock().expect("lock").is_empty());
    }

    #[test]
    fn ratio_scales_the_pause() {
        // Four T-states per frame, so a single instruction ends it.
        let mut clock = MachineClock::new(MasterClock::new(200));
        let pacer = RecordingPacer::default();
        clock.set_pacer(Box::new(pacer.clone()));
        clock.set_speed_ratio(2.0);

        let mut cpu = ScriptedCpu::new(4);
        let mut bus = TestBus::default();
        clock.reset();
        clock.run(&mut cpu, &mut bus, 1);

        let pauses = pacer.0.lock().expect("lock");
        assert_eq!(pauses.len(), 1);
        assert!(pauses[0] <= FRAME_INTERVAL / 2);
    }

    #[test]
    fn reset_zeroes_counter() {
        let mut clock = MachineClock::new(MasterClock::new(3_500_000));
        let mut cpu = ScriptedCpu::new(4);
        let mut bus = TestBus::default();
        clock.run(&mut cpu, &mut bus, 100);
        clock.reset();
        assert_eq!(clock.cycles(), Ticks::ZERO);
    }

    #[test]
    fn speed_limit_serde_shape() {
        let json = serde_json::to_string(&SpeedLimit::Ratio(1.5)).expect("serialize");
        assert_eq!(json, r#"{"ratio":1.5}"#);
        let back: SpeedLimit = serde_json::from_str(r#""unconstrained""#).expect("deserialize");
        assert_eq!(back, SpeedLimit::Unconstrained);
    }
}
