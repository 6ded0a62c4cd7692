//! Route a handful of events through both delivery paths and release a
//! session argument vector
//!
//! Usage: cargo run --example route_events

use recovery_bridge::{
    DeliveryMode, DispatchContext, EngineOptions, Event, RecordingHost, ValidationCollector,
};

#[derive(Debug, Default)]
struct DemoEngine {
    ticks: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    // Standard path: a recording host sees every event
    let mut recorder = RecordingHost::new();
    {
        let mut ctx = DispatchContext::for_host(DemoEngine::default(), &mut recorder, DeliveryMode::Standard);
        for tick in 0..3u32 {
            ctx.engine_mut().ticks += 1;
            let status = format!("progress {}%", (tick + 1) * 33);
            ctx.dispatch(Event::new(100 + tick, status.as_bytes()));
        }
        println!("engine ticks: {}", ctx.engine().ticks);
    }
    for record in recorder.records() {
        println!(
            "standard  id={:<4} {:?}",
            record.event_id,
            String::from_utf8_lossy(&record.payload)
        );
    }

    // Validation path: warnings become validation errors
    let mut collector = ValidationCollector::new([1]);
    {
        let mut ctx = DispatchContext::for_host(DemoEngine::default(), &mut collector, DeliveryMode::Validation);
        ctx.dispatch(Event::new(1, b"Hashfile 'demo.txt' on line 1 (xyz): Separator unmatched"));
        ctx.dispatch(Event::new(1, b"Device #1: falling back to pure kernel"));
    }
    println!("validation {:?}", collector.result());

    // Session argv: built, lent out, released on drop
    let options = EngineOptions::new("/usr/local/share/engine").with_executable_path("/usr/local/bin");
    let argv = options.session_argv(["-m", "1000", "hashes.txt"])?;
    println!("argv ({}): {:?}", argv.argc(), argv);

    Ok(())
}
