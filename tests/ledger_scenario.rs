//! End-to-end ledger scenario over durable storage

use std::sync::Arc;

use pow_ledger::blockchain::{Blockchain, SledStorage, Transaction, Wallet};
use pow_ledger::config::LedgerConfig;
use tempfile::TempDir;

fn ledger_config() -> LedgerConfig {
    LedgerConfig {
        difficulty: 2,
        mining_reward: 100,
    }
}

async fn open_ledger(dir: &TempDir) -> Result<Blockchain, Box<dyn std::error::Error>> {
    let storage = SledStorage::open(dir.path())?;
    let blockchain = Blockchain::new(Arc::new(storage), &ledger_config());
    blockchain.open().await?;
    Ok(blockchain)
}

#[tokio::test]
async fn test_mine_transfer_and_reload() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let miner = Wallet::new();
    let bob = Wallet::new();
    let carol = Wallet::new();

    let m = miner.address().clone();
    let b = bob.address().clone();
    let c = carol.address().clone();

    {
        let blockchain = open_ledger(&dir).await?;

        let genesis = blockchain.get_chain().await?;
        assert_eq!(genesis.len(), 1);
        assert!(genesis[0].transactions.is_empty());

        // Block 1: reward only
        let block1 = blockchain.mine_pending_transactions(m.clone()).await?;
        assert_eq!(block1.transactions.len(), 1);
        assert_eq!(block1.transactions[0].to_address, m);
        assert!(block1.hash.starts_with("00"));
        assert_eq!(blockchain.get_balance_of_address(&m).await?, 100);

        // Block 2: M -> B 30, reward to C
        let mut transfer = Transaction::new(m.clone(), b.clone(), 30);
        transfer.sign_with(&miner)?;
        blockchain.add_transaction(transfer.clone()).await?;

        let block2 = blockchain.mine_pending_transactions(c.clone()).await?;
        assert_eq!(block2.transactions.len(), 2);
        assert_eq!(block2.transactions[0], transfer);
        assert!(block2.transactions[1].is_reward());
        assert_eq!(block2.transactions[1].to_address, c);

        assert_eq!(blockchain.get_balance_of_address(&m).await?, 70);
        assert_eq!(blockchain.get_balance_of_address(&b).await?, 30);
        assert_eq!(blockchain.get_balance_of_address(&c).await?, 100);

        let history = blockchain.get_all_transactions_for_wallet(&m).await?;
        assert_eq!(history, vec![block1.transactions[0].clone(), transfer]);

        assert!(blockchain.is_chain_valid().await);
    }

    // The chain survives a restart; the mempool does not need to
    let reopened = open_ledger(&dir).await?;
    assert_eq!(reopened.get_chain().await?.len(), 3);
    assert!(reopened.is_chain_valid().await);
    assert_eq!(reopened.get_balance_of_address(&m).await?, 70);
    assert_eq!(reopened.get_balance_of_address(&b).await?, 30);
    assert_eq!(reopened.get_balance_of_address(&c).await?, 100);
    assert!(reopened.get_pending_transactions().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_pending_transactions_are_volatile() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let alice = Wallet::new();
    let bob = Wallet::new();

    {
        let blockchain = open_ledger(&dir).await?;
        blockchain.mine_pending_transactions(alice.address().clone()).await?;

        let mut transfer = Transaction::new(alice.address().clone(), bob.address().clone(), 10);
        transfer.sign_with(&alice)?;
        blockchain.add_transaction(transfer).await?;
        assert_eq!(blockchain.get_all_transactions().await?.len(), 2);
    }

    let reopened = open_ledger(&dir).await?;
    assert_eq!(reopened.get_all_transactions().await?.len(), 1);
    assert_eq!(reopened.get_balance_of_address(bob.address()).await?, 0);

    Ok(())
}
