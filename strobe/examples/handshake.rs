//! Example: a valid/ready handshake between a driver and a monitor
//!
//! Run with `RUST_LOG=strobe=debug` to watch the scheduler at work.

use strobe::sim::Simulator;
use strobe::task::{self, Coroutine};
use strobe::{Trigger, Value};

fn main() {
    env_logger::init();

    let sim = Simulator::builder().max_time(10_000).build();

    let report = sim.run_test("handshake", |sim| async move {
        let clk = sim.signal("clk", false);
        let valid = sim.signal("valid", false);
        let data = sim.signal("data", 0);

        task::fork(sim.clock(&clk, 5));

        // Monitor: count every beat where valid is high on a rising edge
        let monitor = task::fork(Coroutine::new("monitor", {
            let (clk, valid, data) = (clk.clone(), valid.clone(), data.clone());
            async move {
                let mut sum = 0;
                let mut beats = 0;

                while beats < 4 {
                    Trigger::rising_edge(&clk).await;
                    Trigger::read_only().await;

                    if valid.value().is_high() {
                        sum += data.value().as_int().unwrap_or_default();
                        beats += 1;
                    }
                }

                Ok(Value::Int(sum))
            }
        }));

        // Driver: one word per clock, then deassert
        for word in [3, 5, 7, 11] {
            Trigger::rising_edge(&clk).await;
            valid.set(true);
            data.set(word);
        }

        Trigger::rising_edge(&clk).await;
        valid.set(false);

        let sum = monitor.await;
        println!("monitor saw a total of {sum} at time {}", sim.time());

        if sum != Value::Int(26) {
            return Err(task::fail(format!("expected 26, got {sum}")));
        }

        Ok(Value::None)
    });

    println!("{} at {}", report.verdict, report.sim_time);
}
