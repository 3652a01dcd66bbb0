//! Wiring a [`MinerConfig`] to concrete stores and sync.

use std::path::PathBuf;
use std::sync::Arc;

use tally_repo::{GitObjectStore, NativeObjectStore, ObjectStore};
use tally_sync::{GitSync, LocalTransport, MirrorSync, RemoteSync};

use crate::config::{Backend, MinerConfig};
use crate::error::{MinerError, MinerResult};
use crate::miner::{MinerSetup, MiningSettings};

/// Open the mirror described by `config`, creating its directory if needed.
pub fn open_setup(config: &MinerConfig) -> MinerResult<MinerSetup> {
    config.validate()?;
    if config.origin.is_empty() {
        return Err(MinerError::Configuration("no origin configured".into()));
    }
    let directory = config.mirror_dir.clone();
    std::fs::create_dir_all(&directory).map_err(|e| {
        MinerError::Configuration(format!("{}: {e}", directory.display()))
    })?;
    let branch = config.branch()?;

    let (store, sync): (Arc<dyn ObjectStore>, Arc<dyn RemoteSync>) = match config.backend {
        Backend::Native => {
            let origin = PathBuf::from(&config.origin);
            if !origin.is_dir() {
                return Err(MinerError::Configuration(format!(
                    "native origin {} is not a directory",
                    origin.display()
                )));
            }
            let transport = LocalTransport::open(&origin)?;
            let local = NativeObjectStore::open(&directory)?;
            let sync = MirrorSync::new(
                Arc::new(transport),
                local.clone(),
                &directory,
                branch,
                &config.genesis_ref,
            );
            (Arc::new(local), Arc::new(sync))
        }
        Backend::Git => (
            Arc::new(GitObjectStore::new(&directory)),
            Arc::new(GitSync::new(
                &directory,
                &config.origin,
                branch,
                &config.genesis_ref,
            )),
        ),
    };

    Ok(MinerSetup {
        store,
        sync,
        directory,
        branch_ref: config.branch_ref()?,
        genesis_ref: config.genesis_ref.clone(),
        settings: MiningSettings::from(config),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::ChainBootstrap;
    use crate::request::StaleAction;
    use crate::verify::verify_chain;
    use tally_refs::RefStore;
    use tally_sync::init_native_origin;

    fn config(origin: &std::path::Path, mirror: &std::path::Path) -> MinerConfig {
        MinerConfig {
            origin: origin.to_string_lossy().into_owned(),
            mirror_dir: mirror.to_path_buf(),
            coin: "gold".into(),
            difficulty: 1,
            link_level: 3,
            ..MinerConfig::default()
        }
    }

    #[test]
    fn native_origin_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir.path().join("missing"), &dir.path().join("mirror"));
        assert!(matches!(
            open_setup(&config),
            Err(MinerError::Configuration(_))
        ));
    }

    #[test]
    fn empty_origin_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), &dir.path().join("mirror"));
        config.origin.clear();
        assert!(matches!(
            open_setup(&config),
            Err(MinerError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn native_mirror_bootstraps_and_commits() {
        let origin = tempfile::tempdir().unwrap();
        let mirror = tempfile::tempdir().unwrap();
        let config = config(origin.path(), mirror.path());
        init_native_origin(origin.path(), &config.identity(), &config.genesis_ref)
            .await
            .unwrap();

        let miner = ChainBootstrap::new(open_setup(&config).unwrap())
            .run()
            .await
            .unwrap();
        std::fs::write(mirror.path().join("wallets.txt"), "alice 10\n").unwrap();
        assert!(miner.commit("deposit alice 10").await.unwrap());

        let tip = miner.last_block();
        assert_eq!(tip.summary(), "deposit alice 10");
        let store = NativeObjectStore::open(mirror.path()).unwrap();
        let report = verify_chain(&store, tip.hash, miner.first_block().hash, 1, 3)
            .await
            .unwrap();
        assert_eq!(report.length, 4);

        let origin_tip = LocalTransport::open(origin.path())
            .unwrap()
            .refs()
            .resolve("refs/heads/coins/gold")
            .unwrap();
        assert_eq!(origin_tip, Some(tip.hash));
    }

    #[tokio::test]
    async fn reattaching_keeps_pending_edits_for_commit() {
        let origin = tempfile::tempdir().unwrap();
        let mirror = tempfile::tempdir().unwrap();
        let config = config(origin.path(), mirror.path());
        init_native_origin(origin.path(), &config.identity(), &config.genesis_ref)
            .await
            .unwrap();
        let miner = ChainBootstrap::new(open_setup(&config).unwrap())
            .run()
            .await
            .unwrap();
        let before = miner.last_block();
        miner.shutdown().await;

        // Edit between runs, then attach again the way each command does.
        std::fs::write(mirror.path().join("wallets.txt"), "alice 10\n").unwrap();
        let miner = ChainBootstrap::new(open_setup(&config).unwrap())
            .run()
            .await
            .unwrap();
        assert_eq!(miner.last_block(), before);
        assert!(mirror.path().join("wallets.txt").exists());

        assert!(miner.commit("deposit").await.unwrap());
        let tip = miner.last_block();
        miner.shutdown().await;
        assert_eq!(tip.first_parent(), Some(before.hash));
        assert_ne!(tip.tree, before.tree);

        let store = NativeObjectStore::open(mirror.path()).unwrap();
        let stored = store.odb().read(&tip.tree).unwrap().unwrap();
        let tree = tally_store::Tree::from_stored_object(&stored).unwrap();
        assert!(tree.get("wallets.txt").is_some());
    }

    #[tokio::test]
    async fn losing_miner_retries_on_top_of_the_winner() {
        let origin = tempfile::tempdir().unwrap();
        let a_dir = tempfile::tempdir().unwrap();
        let b_dir = tempfile::tempdir().unwrap();
        let a_config = config(origin.path(), a_dir.path());
        let b_config = MinerConfig {
            stale_action: StaleAction::Retry,
            ..config(origin.path(), b_dir.path())
        };
        init_native_origin(origin.path(), &a_config.identity(), &a_config.genesis_ref)
            .await
            .unwrap();

        let a = ChainBootstrap::new(open_setup(&a_config).unwrap()).run().await.unwrap();
        let b = ChainBootstrap::new(open_setup(&b_config).unwrap()).run().await.unwrap();
        assert_eq!(a.last_block(), b.last_block());

        std::fs::write(a_dir.path().join("wallets.txt"), "alice 1\n").unwrap();
        assert!(a.commit("alice").await.unwrap());
        let winner = a.last_block();

        // b still believes the bootstrap tip is current.
        std::fs::write(b_dir.path().join("wallets.txt"), "bob 1\n").unwrap();
        assert!(b.commit("bob").await.unwrap());
        let landed = b.last_block();
        assert_eq!(landed.first_parent(), Some(winner.hash));
        assert_eq!(landed.summary(), "bob");

        let b_store = NativeObjectStore::open(b_dir.path()).unwrap();
        verify_chain(&b_store, landed.hash, b.first_block().hash, 1, 3)
            .await
            .unwrap();
        let origin_tip = LocalTransport::open(origin.path())
            .unwrap()
            .refs()
            .resolve("refs/heads/coins/gold")
            .unwrap();
        assert_eq!(origin_tip, Some(landed.hash));
    }
}
