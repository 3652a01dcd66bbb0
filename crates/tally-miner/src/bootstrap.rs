use tally_repo::Block;
use tally_sync::SyncError;
use tally_types::ObjectId;
use tracing::{info, warn};

use crate::error::{MinerError, MinerResult};
use crate::miner::{Miner, MinerSetup};
use crate::request::{DateMode, PendingBlockRequest, StaleAction};
use crate::window::ancestor_window;

/// Attaches a mirror to its origin and hands back a running [`Miner`].
///
/// A chain that is still only genesis first gets `link_level - 1` blocks, so
/// every later block has a full ancestor window to link to. A chain that
/// already has blocks must have at least that many behind its tip.
pub struct ChainBootstrap {
    setup: MinerSetup,
}

impl ChainBootstrap {
    pub fn new(setup: MinerSetup) -> Self {
        Self { setup }
    }

    pub async fn run(self) -> MinerResult<Miner> {
        let setup = self.setup;
        let tip = setup.sync.attach().await.map_err(|e| match e {
            SyncError::GenesisMissing(name) => {
                MinerError::Configuration(format!("origin has no genesis at {name}"))
            }
            other => other.into(),
        })?;
        let genesis_hash = setup
            .store
            .resolve_ref(&setup.genesis_ref)
            .await?
            .ok_or_else(|| {
                MinerError::Configuration(format!("{} does not resolve", setup.genesis_ref))
            })?;
        let genesis = read(&setup, genesis_hash).await?;
        let link_level = setup.settings.link_level;
        let needed = link_level.saturating_sub(1);

        if tip == genesis_hash {
            let miner = Miner::start(setup, genesis.clone(), genesis)?;
            for index in 1..=needed {
                let snapshot = miner.snapshot().await?;
                let request = PendingBlockRequest::from_snapshot(snapshot)
                    .with_message(format!("bootstrap {index}/{needed}"))
                    .with_date_mode(DateMode::LastBlockIncrement)
                    .with_stale_action(StaleAction::Stop);
                if !miner.enqueue(request)?.wait().await? {
                    warn!(index, "origin advanced during bootstrap");
                    miner.shutdown().await;
                    return Err(MinerError::Configuration(
                        "origin advanced while the chain was being bootstrapped".into(),
                    ));
                }
            }
            info!(blocks = needed, tip = %miner.last_block().hash, "chain bootstrapped");
            return Ok(miner);
        }

        let tip_block = read(&setup, tip).await?;
        let window = ancestor_window(setup.store.as_ref(), &tip_block, link_level).await?;
        if window.len() < link_level {
            return Err(MinerError::Configuration(format!(
                "outdated: tip {tip} has {} ancestors, link level {link_level} needs {needed}",
                window.len() - 1
            )));
        }
        info!(%genesis_hash, %tip, "attached to existing chain");
        Miner::start(setup, genesis, tip_block)
    }
}

async fn read(setup: &MinerSetup, hash: ObjectId) -> MinerResult<Block> {
    setup
        .store
        .read_block(&hash)
        .await?
        .ok_or(MinerError::MissingBlock(hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{identity, scripted_setup};
    use tally_repo::BlockDraft;

    #[tokio::test]
    async fn fresh_chain_gets_a_linked_prefix() {
        let (setup, genesis, store, _sync) = scripted_setup(1, 3);
        let miner = ChainBootstrap::new(setup).run().await.unwrap();

        let drafts = store.drafts();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].parents, vec![genesis.hash]);
        let first = store.block(&drafts[1].parents[0]).unwrap();
        assert_eq!(drafts[1].parents, vec![first.hash, genesis.hash]);
        assert_eq!(first.date(), genesis.date().increment());
        assert_eq!(drafts[1].date, genesis.date().increment().increment());
        assert!(drafts[1].message.starts_with("bootstrap 2/2\n\n"));
        assert_ne!(miner.last_block().hash, genesis.hash);
        assert_eq!(miner.first_block(), genesis);
    }

    #[tokio::test]
    async fn link_level_one_needs_no_prefix() {
        let (setup, genesis, store, _sync) = scripted_setup(1, 1);
        let miner = ChainBootstrap::new(setup).run().await.unwrap();
        assert!(store.drafts().is_empty());
        assert_eq!(miner.last_block(), genesis);
    }

    #[tokio::test]
    async fn reattaching_to_a_deep_enough_chain_mines_nothing() {
        let (setup, genesis, store, sync) = scripted_setup(1, 2);
        let block = BlockDraft {
            tree: genesis.tree,
            parents: vec![genesis.hash],
            identity: identity(),
            date: genesis.date().increment(),
            message: "elsewhere".into(),
        }
        .into_block(ObjectId::from_bytes(b"mined elsewhere"));
        store.insert(block.clone());
        sync.advance_remote(block.hash);

        let miner = ChainBootstrap::new(setup).run().await.unwrap();
        assert!(store.drafts().is_empty());
        assert_eq!(miner.last_block(), block);
    }

    #[tokio::test]
    async fn shallow_existing_chain_is_outdated() {
        let (setup, genesis, store, sync) = scripted_setup(1, 3);
        let block = BlockDraft {
            tree: genesis.tree,
            parents: vec![genesis.hash],
            identity: identity(),
            date: genesis.date(),
            message: "short".into(),
        }
        .into_block(ObjectId::from_bytes(b"short"));
        store.insert(block.clone());
        sync.advance_remote(block.hash);

        match ChainBootstrap::new(setup).run().await {
            Err(MinerError::Configuration(msg)) => assert!(msg.starts_with("outdated")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("bootstrap should have failed"),
        }
    }

    #[tokio::test]
    async fn missing_genesis_is_a_configuration_error() {
        let (mut setup, _genesis, _store, _sync) = scripted_setup(1, 3);
        setup.genesis_ref = "refs/tags/nowhere".into();
        assert!(matches!(
            ChainBootstrap::new(setup).run().await,
            Err(MinerError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn staleness_during_bootstrap_is_fatal() {
        let (setup, _genesis, store, sync) = scripted_setup(1, 3);
        sync.script_pushes([false]);
        assert!(matches!(
            ChainBootstrap::new(setup).run().await,
            Err(MinerError::Configuration(_))
        ));
        assert_eq!(store.drafts().len(), 1);
    }
}
