//! Example: driving a scheduler by hand with a task written as a state machine

use strobe::sim::Simulator;
use strobe::task::{Coroutine, Cx, Resumption, Task};
use strobe::{Signal, Trigger, Value, Verdict};

/// Pulses `reset` high for `cycles` timer ticks, then releases it.
struct ResetPulse {
    reset: Signal,
    cycles: u32,
}

impl Task for ResetPulse {
    fn name(&self) -> &str {
        "reset-pulse"
    }

    fn start(&mut self, cx: &Cx<'_>) -> Resumption {
        cx.save_write(&self.reset, true);
        Resumption::wait(Trigger::timer(10))
    }

    fn resume(&mut self, _fired: Trigger, cx: &Cx<'_>) -> Resumption {
        self.cycles -= 1;

        if self.cycles > 0 {
            return Resumption::wait(Trigger::timer(10));
        }

        cx.save_write(&self.reset, false);
        Resumption::done(Value::None)
    }
}

fn main() {
    env_logger::init();

    let sim = Simulator::new();
    let mut scheduler = sim.scheduler();
    let reset = sim.signal("reset", false);

    let pulse = scheduler
        .add(ResetPulse {
            reset: reset.clone(),
            cycles: 3,
        })
        .expect("reset pulse failed to start");

    scheduler
        .add(Coroutine::test("wait-for-reset", async move {
            let _ = pulse.await;
            Trigger::read_only().await;

            println!("reset released: {}", reset.value());
            Ok(Value::None)
        }))
        .expect("test failed to start");

    match sim.run(&mut scheduler) {
        Ok(report) if report.verdict == Verdict::Pass => {
            println!("passed at {}", report.sim_time);
        }
        Ok(report) => println!("{}", report.verdict),
        Err(err) => eprintln!("aborted: {err}"),
    }
}
