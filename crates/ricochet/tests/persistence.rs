//! Snapshot save/load and server startup/shutdown against a real
//! temporary directory.

use std::path::Path;
use std::time::Duration;

use ricochet::{
    ChannelBroadcaster, GamePhase, PersistenceConfig, PersistenceError, PersistenceManager,
    PlayerStatus, RicochetError, RicochetServer, Room, RoomService, ServerConfig, Snapshot,
    SNAPSHOT_VERSION,
};
use ricochet_protocol::{unix_millis, PlayerId, RoomId};
use ricochet_room::Player;
use ricochet_room::testing::ScriptedGame;

type Service = RoomService<ScriptedGame, ChannelBroadcaster>;

const DAY_SECS: u64 = 24 * 60 * 60;

fn persistence_config(dir: &Path) -> PersistenceConfig {
    PersistenceConfig {
        enabled: true,
        snapshot_path: dir.join("state").join("rooms.json"),
        snapshot_interval_secs: 3600,
        max_room_age_secs: DAY_SECS,
    }
}

fn manager(
    service: &Service,
    dir: &Path,
) -> PersistenceManager<ScriptedGame, ChannelBroadcaster> {
    PersistenceManager::new(service.clone(), persistence_config(dir))
}

fn write_snapshot(path: &Path, rooms: Vec<Room<ScriptedGame>>) {
    let snapshot = Snapshot::<ScriptedGame> {
        version: SNAPSHOT_VERSION,
        saved_at: unix_millis(),
        rooms,
    };
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_vec(&snapshot).unwrap()).unwrap();
}

// =========================================================================
// PersistenceManager
// =========================================================================

#[tokio::test]
async fn test_save_then_load_restores_rooms() {
    let dir = tempfile::tempdir().unwrap();
    let service = Service::new(ChannelBroadcaster::default());
    let created = service.create_room("Ada").await.unwrap();
    let room_id = created.room.id.clone();
    let ada = created.player_id;
    let bob = service.join_room(&room_id, "Bob").await.unwrap().player_id;
    service.start_game(&room_id, false).await.unwrap();
    let board = service.get_room(&room_id).await.unwrap().game.unwrap();
    service
        .submit_solution(&room_id, &ada, ScriptedGame::solution(&board, 6))
        .await
        .unwrap();
    service
        .submit_solution(&room_id, &ada, ScriptedGame::solution(&board, 4))
        .await
        .unwrap();
    service.mark_finished_solving(&room_id, &ada).await.unwrap();
    service.mark_finished_solving(&room_id, &bob).await.unwrap();
    let before = service.get_room(&room_id).await.unwrap();
    assert_eq!(before.phase, GamePhase::Ended);

    assert_eq!(manager(&service, dir.path()).save().await.unwrap(), 1);
    let path = persistence_config(dir.path()).snapshot_path;
    assert!(path.exists());
    assert!(!path.with_file_name("rooms.json.tmp").exists());

    let restored = Service::new(ChannelBroadcaster::default());
    assert_eq!(manager(&restored, dir.path()).load().await.unwrap(), 1);

    let after = restored.get_room(&room_id).await.unwrap();
    assert_eq!(after.players, before.players);
    assert_eq!(after.phase, before.phase);
    assert_eq!(after.game, before.game);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.solutions, before.solutions);
    assert_eq!(after.solution_history, before.solution_history);
    assert_eq!(after.solution_history[&ada].len(), 2);
    assert_eq!(after.wins, before.wins);
    assert_eq!(after.wins_for(&ada), 1);
    assert_eq!(after.games_played, 1);
    assert_eq!(after.finished_solving, before.finished_solving);
}

#[tokio::test]
async fn test_load_missing_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let service = Service::new(ChannelBroadcaster::default());
    assert_eq!(manager(&service, dir.path()).load().await.unwrap(), 0);
    assert!(service.repository().is_empty().await);
}

#[tokio::test]
async fn test_load_skips_stale_rooms() {
    let dir = tempfile::tempdir().unwrap();
    let now = unix_millis();
    let stale = Room::new(RoomId::new("OLD001"), Player::new(PlayerId::new("p1"), "Ada"), 0);
    let fresh = Room::new(RoomId::new("NEW001"), Player::new(PlayerId::new("p2"), "Bob"), now);
    write_snapshot(&persistence_config(dir.path()).snapshot_path, vec![stale, fresh]);

    let service = Service::new(ChannelBroadcaster::default());
    assert_eq!(manager(&service, dir.path()).load().await.unwrap(), 1);
    assert_eq!(service.repository().ids().await, vec![RoomId::new("NEW001")]);
}

#[tokio::test]
async fn test_load_resumes_grace_timers_for_disconnected_players() {
    let dir = tempfile::tempdir().unwrap();
    let now = unix_millis();
    let mut room = Room::new(RoomId::new("ROOM01"), Player::new(PlayerId::new("p1"), "Ada"), now);
    let mut away = Player::new(PlayerId::new("p2"), "Bob");
    away.status = PlayerStatus::Disconnected;
    away.disconnected_at = Some(now - 5_000);
    room.players.push(away);
    write_snapshot(&persistence_config(dir.path()).snapshot_path, vec![room]);

    let service = Service::new(ChannelBroadcaster::default());
    manager(&service, dir.path()).load().await.unwrap();

    assert!(service.has_grace_timer(&PlayerId::new("p2")));
    assert!(!service.has_grace_timer(&PlayerId::new("p1")));
    service.shutdown();
}

#[tokio::test]
async fn test_load_rejects_unsupported_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = persistence_config(dir.path()).snapshot_path;
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, r#"{"version": 99, "saved_at": 0, "rooms": []}"#).unwrap();

    let service = Service::new(ChannelBroadcaster::default());
    let err = manager(&service, dir.path()).load().await.unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::UnsupportedVersion {
            found: 99,
            expected: SNAPSHOT_VERSION
        }
    ));
}

#[tokio::test]
async fn test_load_corrupt_file_is_codec_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = persistence_config(dir.path()).snapshot_path;
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"{ not json").unwrap();

    let service = Service::new(ChannelBroadcaster::default());
    let err = manager(&service, dir.path()).load().await.unwrap_err();
    assert!(matches!(err, PersistenceError::Codec(_)));
}

#[tokio::test]
async fn test_sweep_purges_idle_rooms() {
    let dir = tempfile::tempdir().unwrap();
    let service = Service::new(ChannelBroadcaster::default());
    let created = service.create_room("Ada").await.unwrap();
    let manager = manager(&service, dir.path());

    assert!(manager.sweep().await.is_empty());
    let purged = manager.sweep_at(unix_millis() + (DAY_SECS + 1) * 1_000).await;
    assert_eq!(purged, vec![created.room.id]);
    assert!(service.repository().is_empty().await);
}

#[tokio::test]
async fn test_spawned_loop_saves_periodically_and_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = persistence_config(dir.path());
    config.snapshot_interval_secs = 1;
    let path = config.snapshot_path.clone();

    let service = Service::new(ChannelBroadcaster::default());
    service.create_room("Ada").await.unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let task = PersistenceManager::new(service.clone(), config).spawn(shutdown_rx);

    let mut waited = Duration::ZERO;
    while !path.exists() {
        assert!(waited < Duration::from_secs(10), "no periodic snapshot written");
        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += Duration::from_millis(50);
    }

    service.create_room("Bob").await.unwrap();
    shutdown_tx.send(true).unwrap();
    task.await.unwrap().unwrap();

    let restored = Service::new(ChannelBroadcaster::default());
    assert_eq!(manager(&restored, dir.path()).load().await.unwrap(), 2);
}

// =========================================================================
// RicochetServer
// =========================================================================

#[tokio::test]
async fn test_server_shutdown_writes_final_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        persistence: persistence_config(dir.path()),
        ..ServerConfig::default()
    };

    let server =
        RicochetServer::<ScriptedGame, _>::start(config.clone(), ChannelBroadcaster::default())
            .await
            .unwrap();
    let created = server.service().create_room("Ada").await.unwrap();
    server.shutdown().await.unwrap();
    assert!(config.persistence.snapshot_path.exists());

    let server = RicochetServer::<ScriptedGame, _>::start(config, ChannelBroadcaster::default())
        .await
        .unwrap();
    let room = server.service().get_room(&created.room.id).await.unwrap();
    assert_eq!(room.players[0].name, "Ada");
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_server_without_persistence_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServerConfig {
        persistence: persistence_config(dir.path()),
        ..ServerConfig::default()
    };
    config.persistence.enabled = false;

    let server =
        RicochetServer::<ScriptedGame, _>::start(config.clone(), ChannelBroadcaster::default())
            .await
            .unwrap();
    server.service().create_room("Ada").await.unwrap();
    server.shutdown().await.unwrap();
    assert!(!config.persistence.snapshot_path.exists());
}

#[tokio::test]
async fn test_server_rejects_invalid_config() {
    let mut config = ServerConfig::default();
    config.rooms.max_players = 0;
    let err = RicochetServer::<ScriptedGame, _>::start(config, ChannelBroadcaster::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, RicochetError::Config(_)));
}
