//! # Harbor Demo
//!
//! Headless run of the kernel: a small fleet sails toward the harbor while a
//! render-side memo follows the flagship.
//!
//! Usage:
//!
//! ```text
//! harbor_demo [--config regatta.toml] [--realtime] [--frames N]
//! ```
//!
//! Logging goes through `RUST_LOG` (default `harbor_demo=info,regatta=info`).

use std::error::Error;

use tracing::info;
use tracing_subscriber::EnvFilter;

use regatta::core::{
    entity_memoized_value, AddOptions, EngineConfig, Entities, Entity, EntityId, FrameContext,
    RemoveSelector, Session, Systems,
};
use regatta::{FrameHost, GameLoop, ManualHost, WallClockHost};

/// Harbor wall position, in sea units.
const HARBOR_X: f32 = 120.0;

/// Frames to simulate unless `--frames` says otherwise.
const DEFAULT_FRAMES: u64 = 600;

/// Ticks between two gusts.
const GUST_EVERY_TICKS: u64 = 90;

#[derive(Clone, Debug, PartialEq)]
struct Vessel {
    x: f32,
    speed: f32,
}

#[derive(Clone, Debug)]
enum HarborEvent {
    Gust(f32),
    Docked(EntityId),
}

struct Args {
    config: Option<String>,
    realtime: bool,
    frames: u64,
}

fn parse_args() -> Result<Args, Box<dyn Error>> {
    let mut args = Args {
        config: None,
        realtime: false,
        frames: DEFAULT_FRAMES,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => args.config = iter.next(),
            "--realtime" => args.realtime = true,
            "--frames" => {
                args.frames = iter.next().ok_or("--frames needs a value")?.parse()?;
            }
            other => return Err(format!("unknown argument `{other}`").into()),
        }
    }
    Ok(args)
}

fn build_systems() -> Systems<Vessel, HarborEvent> {
    let mut systems = Systems::new();

    // Wind: every GUST_EVERY_TICKS ticks a gust pushes the fleet. Counted in
    // ticks, since the clock may not advance a whole frame per tick.
    let mut ticks = 0u64;
    systems.add_named(
        "wind",
        move |_: &Entities<Vessel>, ctx: &FrameContext<HarborEvent>| {
            ticks += 1;
            if ticks % GUST_EVERY_TICKS == 0 {
                ctx.dispatch.emit("weather", &HarborEvent::Gust(1.5));
            }
        },
    );

    // Sailing: gusts from the previous tick bump speed, then everyone moves.
    systems.add_named(
        "sailing",
        |entities: &Entities<Vessel>, ctx: &FrameContext<HarborEvent>| {
            let gust: f32 = ctx
                .events
                .iter()
                .filter_map(|e| match e {
                    HarborEvent::Gust(strength) => Some(*strength),
                    HarborEvent::Docked(_) => None,
                })
                .sum();
            #[allow(clippy::cast_possible_truncation)]
            let dt = ctx.delta_secs() as f32;
            for boat in entities.get_by_group("fleet") {
                entities.modify(boat.id(), |v| Vessel {
                    x: v.x + (v.speed + gust) * dt,
                    speed: v.speed + gust,
                });
            }
        },
    );

    // Docking: boats past the harbor wall leave the sea.
    systems.add_named(
        "docking",
        |entities: &Entities<Vessel>, ctx: &FrameContext<HarborEvent>| {
            for boat in entities.get_by_group("fleet") {
                if boat.read(|v| v.x) >= HARBOR_X {
                    entities.remove(&boat);
                    ctx.dispatch.emit("harbor", &HarborEvent::Docked(boat.id()));
                }
            }
        },
    );

    systems
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("harbor_demo=info".parse()?)
                .add_directive("regatta=info".parse()?),
        )
        .init();

    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    info!("harbor demo starting ({} frames)", args.frames);

    let session: Session<Vessel, HarborEvent> = Session::new(config)?;

    // Render side: the flagship's distance to the harbor, as a label.
    let distance = session.memo(entity_memoized_value(
        "flagship",
        |v: &Vessel| v.x,
        |x: &f32| format!("{:.0} to harbor", (HARBOR_X - x).max(0.0)),
        |last: &f32, now: &f32| (last - now).abs() < 1.0,
        String::from("no flagship"),
    ))?;

    let docked = std::sync::Arc::new(parking_lot::Mutex::new(0u32));
    let counter = std::sync::Arc::clone(&docked);
    let _harbor = session.events().on_scoped("harbor", move |event| {
        if let HarborEvent::Docked(id) = event {
            info!("{id} docked");
            *counter.lock() += 1;
        }
    });

    let entities = session.entities();
    for (i, speed) in [8.0_f32, 11.0, 14.0, 9.5].into_iter().enumerate() {
        let mut options = AddOptions::new().group("fleet");
        if i == 0 {
            options = options.label("flagship");
        }
        #[allow(clippy::cast_precision_loss)]
        let x = i as f32 * -5.0;
        entities.add(Entity::new(Vessel { x, speed }), options)?;
    }
    info!("fleet of {} at sea", entities.len());

    let mut game = GameLoop::new(session.clone(), build_systems());
    let ticks = if args.realtime {
        let mut host = WallClockHost::from_config(session.config());
        game.mount(host.now())?;
        game.run(&mut host, Some(args.frames))?
    } else {
        let frames = usize::try_from(args.frames)?;
        let mut host = ManualHost::steady(0.0, session.config().target_frame_ms, frames);
        game.mount(host.now())?;
        game.run(&mut host, None)?
    };

    info!(
        "{ticks} ticks, clock at frame {}, flagship: {}, docked: {}",
        session.frames().current_frame(),
        distance.get(),
        *docked.lock()
    );

    let stragglers = entities.remove(RemoveSelector::groups(["fleet"]));
    game.unmount()?;
    session.close();
    info!("{stragglers} boats still at sea, session closed");
    Ok(())
}
