use chrono::Utc;
use points_cli::snapshots::save_now;
use points_cli::NodeConfig;
use points_economy::{Economy, MiningRequest, NewAccount};
use points_storage::Storage;
use std::sync::Arc;

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = NodeConfig::parse("[economy]\nbootstrap_admins = [\"root\"]\n").unwrap();
    config.apply_overrides(None, Some(dir.path().to_path_buf()), None);

    let storage = Arc::new(Storage::open(&config.storage.data_dir).unwrap());
    assert!(storage.load_economy().unwrap().is_none());

    let economy = Arc::new(Economy::new(config.economy.clone()).unwrap());
    let now = Utc::now();
    for id in ["root", "alice"] {
        economy
            .register_account(
                NewAccount {
                    account_id: id.into(),
                    display_name: id.into(),
                    ..Default::default()
                },
                now,
            )
            .unwrap();
    }
    economy
        .start_mining(
            MiningRequest {
                account_id: "alice".into(),
                fingerprint_hash: "a".repeat(64),
                ..Default::default()
            },
            now,
        )
        .unwrap();
    let balance = economy.account("alice").unwrap().balance();
    save_now(storage.clone(), economy.clone()).await.unwrap();

    let snapshot = storage.load_economy().unwrap().unwrap();
    let restored = Economy::restore(config.economy.clone(), snapshot).unwrap();
    assert_eq!(restored.account("alice").unwrap().balance(), balance);
    assert!(restored.account("root").unwrap().is_admin);
    assert_eq!(restored.mining_sessions("alice").len(), 1);
}
