use std::time::Duration;

use rand::{rngs::StdRng, SeedableRng};
use tokio::{
    sync::mpsc,
    time::{self, Instant},
};

use crate::{
    config::GameConfig,
    game::{engine::RoundEngine, items::ItemCatalog},
    models::{Phase, PointerInput},
    websocket::messages::ServerMessage,
};

/// Player inputs forwarded from the WebSocket handler to the session driver.
#[derive(Debug, Clone, Copy)]
pub enum SessionCommand {
    Start,
    Grab,
    MoveCursor(PointerInput),
}

/// What the next spawn-cycle deadline does when it fires.
#[derive(Debug, Clone, Copy)]
enum CycleStep {
    Spawn,
    PartialClear,
    FullClear,
}

/// Drives one session's engine with tokio timers.
///
/// The task owns every scheduled deadline for its session, so cancellation
/// is just overwriting the local state: restarting scraps all previous
/// deadlines, the countdown hitting zero discards the spawn cycle, and
/// dropping the task (client disconnect) cancels everything at once. The
/// task is single-threaded over the engine, so each timer callback runs to
/// completion before the next — no locking needed.
///
/// A grab's drop-delay deadline deliberately survives the countdown hitting
/// zero: it resolves against the grid as it is then, same as the grab-vs-
/// clear race while running.
pub async fn run_session(
    config: GameConfig,
    catalog: ItemCatalog,
    mut commands: mpsc::Receiver<SessionCommand>,
    updates: mpsc::Sender<ServerMessage>,
) {
    let mut engine = match RoundEngine::new(config.clone(), catalog) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("Refusing to start session: {}", e);
            let _ = updates
                .send(ServerMessage::Error {
                    message: e.to_string(),
                })
                .await;
            return;
        }
    };
    let mut rng = StdRng::from_os_rng();

    let mut countdown = time::interval(Duration::from_secs(1));
    let mut cycle: Option<(Instant, CycleStep)> = None;
    let mut grab_at: Option<Instant> = None;
    let mut catch_clear_at: Option<Instant> = None;

    // Initial view for the client, before the first start.
    if !send_state(&updates, &engine).await {
        return;
    }

    loop {
        let running = engine.phase() == Phase::Running;
        let (cycle_at, cycle_step) = match cycle {
            Some((at, step)) => (Some(at), Some(step)),
            None => (None, None),
        };

        tokio::select! {
            cmd = commands.recv() => {
                let Some(cmd) = cmd else {
                    // Client went away; the session dies with it.
                    break;
                };
                match cmd {
                    SessionCommand::Start => {
                        engine.start();
                        // Scrap every deadline the previous session owned.
                        countdown = time::interval_at(
                            Instant::now() + Duration::from_secs(1),
                            Duration::from_secs(1),
                        );
                        cycle = Some((Instant::now(), CycleStep::Spawn));
                        grab_at = None;
                        catch_clear_at = None;
                        if !send_state(&updates, &engine).await {
                            break;
                        }
                    }
                    SessionCommand::Grab => {
                        if engine.begin_grab() {
                            grab_at = Some(Instant::now() + config.drop_delay());
                            if !send_state(&updates, &engine).await {
                                break;
                            }
                        }
                    }
                    SessionCommand::MoveCursor(pointer) => {
                        if engine.move_cursor(pointer) {
                            if !send_state(&updates, &engine).await {
                                break;
                            }
                        }
                    }
                }
            }
            _ = countdown.tick(), if running => {
                if engine.tick() == Phase::Ended {
                    // In-flight spawn/clear deadlines die with the session.
                    cycle = None;
                }
                if !send_state(&updates, &engine).await {
                    break;
                }
            }
            _ = time::sleep_until(cycle_at.unwrap_or_else(far_future)), if cycle_at.is_some() => {
                if let Some(step) = cycle_step {
                    match step {
                        CycleStep::Spawn => {
                            engine.spawn_wave(&mut rng);
                            cycle = Some((
                                Instant::now() + config.normal_visible(),
                                CycleStep::PartialClear,
                            ));
                        }
                        CycleStep::PartialClear => {
                            engine.clear_upper_tiers();
                            cycle = Some((
                                Instant::now() + config.low_tier_visible(),
                                CycleStep::FullClear,
                            ));
                        }
                        CycleStep::FullClear => {
                            engine.clear_grid();
                            cycle = Some((
                                Instant::now() + config.clear_duration(),
                                CycleStep::Spawn,
                            ));
                        }
                    }
                    if !send_state(&updates, &engine).await {
                        break;
                    }
                }
            }
            _ = time::sleep_until(grab_at.unwrap_or_else(far_future)), if grab_at.is_some() => {
                grab_at = None;
                if let Some(result) = engine.resolve_grab() {
                    catch_clear_at = Some(Instant::now() + config.catch_display());
                    if updates
                        .send(ServerMessage::CatchResult { result })
                        .await
                        .is_err()
                    {
                        break;
                    }
                    if !send_state(&updates, &engine).await {
                        break;
                    }
                }
            }
            _ = time::sleep_until(catch_clear_at.unwrap_or_else(far_future)), if catch_clear_at.is_some() => {
                catch_clear_at = None;
                engine.clear_pending_catch();
                if !send_state(&updates, &engine).await {
                    break;
                }
            }
        }
    }
}

/// Placeholder deadline for disarmed `select!` branches; never polled.
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400)
}

/// Push a fresh snapshot to the client. Returns false once the receiver is
/// gone, which tells the driver to stop.
async fn send_state(updates: &mpsc::Sender<ServerMessage>, engine: &RoundEngine) -> bool {
    updates
        .send(ServerMessage::SessionState {
            state: engine.snapshot(),
        })
        .await
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Rarity, SessionSnapshot};

    fn test_config() -> GameConfig {
        let mut config = GameConfig::stock();
        config.game_duration_secs = 2;
        config.normal_visible_ms = 400;
        config.low_tier_visible_ms = 300;
        config.clear_duration_ms = 200;
        config.drop_delay_ms = 100;
        config.catch_display_ms = 150;
        config
    }

    fn spawn_driver(
        config: GameConfig,
    ) -> (
        mpsc::Sender<SessionCommand>,
        mpsc::Receiver<ServerMessage>,
        tokio::task::JoinHandle<()>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (upd_tx, upd_rx) = mpsc::channel(64);
        let driver = tokio::spawn(run_session(
            config,
            ItemCatalog::standard(),
            cmd_rx,
            upd_tx,
        ));
        (cmd_tx, upd_rx, driver)
    }

    async fn recv_state(rx: &mut mpsc::Receiver<ServerMessage>) -> SessionSnapshot {
        loop {
            match rx.recv().await.expect("driver should still be running") {
                ServerMessage::SessionState { state } => return state,
                _ => {}
            }
        }
    }

    fn occupied(state: &SessionSnapshot) -> usize {
        state
            .grid
            .iter()
            .flatten()
            .filter(|cell| cell.is_some())
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn spawn_cycle_and_countdown_drive_the_session() {
        let (cmd_tx, mut upd_rx, driver) = spawn_driver(test_config());

        let state = recv_state(&mut upd_rx).await;
        assert_eq!(state.phase, Phase::NotStarted);

        cmd_tx.send(SessionCommand::Start).await.unwrap();
        let state = recv_state(&mut upd_rx).await;
        assert_eq!(state.phase, Phase::Running);
        assert_eq!(state.time_remaining, 2);
        assert_eq!(occupied(&state), 0);

        // t=0: spawn wave.
        let state = recv_state(&mut upd_rx).await;
        assert_eq!(occupied(&state), 6);

        // t=400ms: partial clear leaves only low-tier items.
        let state = recv_state(&mut upd_rx).await;
        assert!(state
            .grid
            .iter()
            .flatten()
            .flatten()
            .all(|item| item.rarity == Rarity::VeryCommon));
        assert!(occupied(&state) >= 3);

        // t=700ms: full clear.
        let state = recv_state(&mut upd_rx).await;
        assert_eq!(occupied(&state), 0);

        // t=900ms: next wave.
        let state = recv_state(&mut upd_rx).await;
        assert_eq!(occupied(&state), 6);

        // t=1s: countdown tick.
        let state = recv_state(&mut upd_rx).await;
        assert_eq!(state.time_remaining, 1);
        assert_eq!(state.phase, Phase::Running);

        drop(cmd_tx);
        driver.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_expiry_ends_the_session_and_silences_the_cycle() {
        let (cmd_tx, mut upd_rx, driver) = spawn_driver(test_config());
        recv_state(&mut upd_rx).await;

        cmd_tx.send(SessionCommand::Start).await.unwrap();
        let mut state = recv_state(&mut upd_rx).await;
        while state.phase != Phase::Ended {
            state = recv_state(&mut upd_rx).await;
        }
        assert_eq!(state.time_remaining, 0);

        // With the cycle discarded and the countdown stopped, the driver
        // goes quiet.
        let extra = time::timeout(Duration::from_secs(30), upd_rx.recv()).await;
        assert!(extra.is_err(), "no further updates after the session ends");

        drop(cmd_tx);
        driver.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn grab_resolves_after_drop_delay_and_scores_the_cell() {
        let mut config = test_config();
        // Keep the wave on the grid for the whole test.
        config.game_duration_secs = 100;
        config.normal_visible_ms = 60_000;
        let (cmd_tx, mut upd_rx, driver) = spawn_driver(config);
        recv_state(&mut upd_rx).await;

        cmd_tx.send(SessionCommand::Start).await.unwrap();
        let start_state = recv_state(&mut upd_rx).await;
        let spawned = recv_state(&mut upd_rx).await;
        assert_eq!(occupied(&spawned), 6);

        // Aim at an occupied cell away from the starting cursor; 300x300
        // bounds over a 6x6 grid give 50px cells.
        let (target, points) = spawned
            .grid
            .iter()
            .enumerate()
            .flat_map(|(y, row)| {
                row.iter()
                    .enumerate()
                    .filter_map(move |(x, cell)| cell.as_ref().map(|item| ((x, y), item.points)))
            })
            .find(|&((x, y), _)| !(x == start_state.cursor.x && y == start_state.cursor.y))
            .expect("a wave always has an occupied cell off the start cursor");

        cmd_tx
            .send(SessionCommand::MoveCursor(PointerInput {
                x: target.0 as f32 * 50.0 + 25.0,
                y: target.1 as f32 * 50.0 + 25.0,
                width: 300.0,
                height: 300.0,
            }))
            .await
            .unwrap();
        let state = recv_state(&mut upd_rx).await;
        assert_eq!((state.cursor.x, state.cursor.y), target);

        cmd_tx.send(SessionCommand::Grab).await.unwrap();
        let state = recv_state(&mut upd_rx).await;
        assert!(state.dropping);

        // After the drop delay: catch result, then the scored snapshot.
        let msg = upd_rx.recv().await.expect("driver alive");
        match msg {
            ServerMessage::CatchResult { result } => {
                assert_eq!(result, crate::models::CatchResult::Caught { points });
            }
            other => panic!("expected catch result, got {:?}", other),
        }
        let state = recv_state(&mut upd_rx).await;
        assert_eq!(state.score, u64::from(points));
        assert!(state.pending_catch.is_some());
        assert!(!state.dropping);

        // The transient display expires on its own.
        let state = recv_state(&mut upd_rx).await;
        assert!(state.pending_catch.is_none());

        drop(cmd_tx);
        driver.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn restart_cancels_a_pending_grab() {
        let mut config = test_config();
        config.game_duration_secs = 100;
        let (cmd_tx, mut upd_rx, driver) = spawn_driver(config);
        recv_state(&mut upd_rx).await;

        cmd_tx.send(SessionCommand::Start).await.unwrap();
        recv_state(&mut upd_rx).await;

        cmd_tx.send(SessionCommand::Grab).await.unwrap();
        // Restart before the drop delay elapses.
        cmd_tx.send(SessionCommand::Start).await.unwrap();

        // Watch a full second of the new session: the stale grab must never
        // resolve.
        let mut state = recv_state(&mut upd_rx).await;
        while state.time_remaining == 100 {
            match upd_rx.recv().await.expect("driver alive") {
                ServerMessage::SessionState { state: s } => state = s,
                ServerMessage::CatchResult { .. } => {
                    panic!("grab from the previous session resolved after restart")
                }
                ServerMessage::Error { message } => panic!("unexpected error: {}", message),
            }
        }
        assert_eq!(state.score, 0);
        assert!(state.pending_catch.is_none());

        drop(cmd_tx);
        driver.await.unwrap();
    }
}
