use strobe::sim::Simulator;
use strobe::task::{self, TaskResult};
use strobe::{Trigger, Value};

#[strobe::test]
async fn test_macro_without_simulator() -> TaskResult {
    Trigger::timer(10).await;
    Ok(Value::None)
}

#[strobe::test]
async fn test_macro_with_simulator(sim: Simulator) -> TaskResult {
    let valid = sim.signal("valid", false);

    valid.set(true);
    Trigger::read_only().await;

    if valid.value() != Value::Bool(true) {
        return Err(task::fail("write was not applied"));
    }

    Ok(Value::None)
}

#[strobe::test(max_time = 1_000)]
async fn test_macro_with_time_limit(sim: Simulator) -> TaskResult {
    let clk = sim.signal("clk", false);
    task::fork(sim.clock(&clk, 5));

    for _ in 0..10 {
        Trigger::rising_edge(&clk).await;
    }

    assert!(sim.time() <= 1_000);
    Ok(Value::None)
}

fn expect_high(value: Value) -> Result<(), strobe::Exit> {
    if value.is_high() {
        Ok(())
    } else {
        Err(task::fail(format!("expected a high level, got {value}")))
    }
}

#[strobe::test]
async fn test_macro_keeps_declared_return_type(sim: Simulator) -> strobe::task::TaskResult {
    let ready = sim.signal("ready", 0);

    ready.set(1);
    Trigger::read_only().await;

    expect_high(ready.value())?;
    Ok(Value::None)
}
