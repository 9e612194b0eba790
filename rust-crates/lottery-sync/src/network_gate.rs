use crate::{
    Error,
    Result,
    types::{
        Address,
        Bytes,
        TxHash,
        WalletSession,
        Wei,
    },
};
pub use ethers::types::TransactionRequest;
use std::future::Future;
use tracing::{
    info,
    warn,
};

/// What a wallet exposes: accounts, the network it is on, and (maybe) signing.
pub trait WalletRpc: Send + Sync {
    /// May prompt the user and suspend until they answer.
    fn request_accounts(&self) -> impl Future<Output = Result<Vec<Address>>> + Send;

    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Signs and broadcasts; resolves once the transaction is submitted, not mined.
    fn send_transaction(
        &self,
        tx: &TransactionRequest,
    ) -> impl Future<Output = Result<TxHash>> + Send;

    fn can_sign(&self) -> bool;
}

/// Hands out sessions only for wallets on the target chain.
pub struct NetworkGate<W> {
    wallet: W,
    target_chain_id: u64,
    network_name: String,
}

impl<W: WalletRpc> NetworkGate<W> {
    pub fn new(wallet: W, target_chain_id: u64, network_name: impl Into<String>) -> Self {
        Self {
            wallet,
            target_chain_id,
            network_name: network_name.into(),
        }
    }

    pub fn target_chain_id(&self) -> u64 {
        self.target_chain_id
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    /// Message shown to the user when the wallet sits on the wrong network.
    pub fn mismatch_notice(&self) -> String {
        format!("Change the network to {}", self.network_name)
    }

    pub async fn connect(&self) -> Result<WalletSession> {
        let accounts = self.wallet.request_accounts().await?;
        let chain_id = self.wallet.chain_id().await?;
        if chain_id != self.target_chain_id {
            warn!(
                expected = self.target_chain_id,
                actual = chain_id,
                "{}",
                self.mismatch_notice()
            );
            return Err(Error::NetworkMismatch {
                expected: self.target_chain_id,
                actual: chain_id,
            });
        }
        let address = accounts.first().copied().ok_or(Error::WalletUnavailable)?;
        let session = WalletSession {
            address,
            chain_id,
            signing_capability: self.wallet.can_sign(),
        };
        info!(?address, chain_id, signing = session.signing_capability, "wallet connected");
        Ok(session)
    }

    pub fn require_signer(&self, session: &WalletSession) -> Result<SigningHandle<'_, W>> {
        if session.chain_id != self.target_chain_id {
            return Err(Error::NetworkMismatch {
                expected: self.target_chain_id,
                actual: session.chain_id,
            });
        }
        if !session.signing_capability {
            return Err(Error::NoSignerAvailable);
        }
        Ok(SigningHandle {
            wallet: &self.wallet,
            from: session.address,
        })
    }
}

/// Write capability for one session's account.
pub struct SigningHandle<'a, W> {
    wallet: &'a W,
    from: Address,
}

impl<W: WalletRpc> SigningHandle<'_, W> {
    pub fn address(&self) -> Address {
        self.from
    }

    pub(crate) async fn send(&self, to: Address, data: Bytes, value: Wei) -> Result<TxHash> {
        let request = TransactionRequest::new()
            .from(self.from)
            .to(to)
            .data(data)
            .value(value);
        self.wallet.send_transaction(&request).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_helpers::{
        FakeChain,
        FakeWallet,
        arb_address,
    };

    const TARGET: u64 = 80001;

    fn gate(wallet: FakeWallet) -> NetworkGate<FakeWallet> {
        NetworkGate::new(wallet, TARGET, "Mumbai")
    }

    #[tokio::test]
    async fn connect__wallet_on_target_chain__returns_session() {
        // given
        let me = arb_address(1);
        let gate = gate(FakeWallet::new(FakeChain::default(), me, TARGET));

        // when
        let session = gate.connect().await.unwrap();

        // then
        assert_eq!(
            session,
            WalletSession {
                address: me,
                chain_id: TARGET,
                signing_capability: true,
            }
        );
    }

    #[tokio::test]
    async fn connect__wallet_on_other_chain__fails_with_network_mismatch() {
        // given
        let gate = gate(FakeWallet::new(FakeChain::default(), arb_address(1), 1));

        // when
        let result = gate.connect().await;

        // then
        assert!(matches!(
            result,
            Err(Error::NetworkMismatch {
                expected: TARGET,
                actual: 1
            })
        ));
        assert_eq!(gate.mismatch_notice(), "Change the network to Mumbai");
    }

    #[tokio::test]
    async fn connect__no_accounts__fails_with_wallet_unavailable() {
        // given
        let wallet = FakeWallet::new(FakeChain::default(), arb_address(1), TARGET)
            .without_accounts();
        let gate = gate(wallet);

        // when
        let result = gate.connect().await;

        // then
        assert!(matches!(result, Err(Error::WalletUnavailable)));
    }

    #[tokio::test]
    async fn require_signer__watch_only_session__fails_with_no_signer() {
        // given
        let wallet =
            FakeWallet::new(FakeChain::default(), arb_address(1), TARGET).watch_only();
        let gate = gate(wallet);
        let session = gate.connect().await.unwrap();

        // when
        let result = gate.require_signer(&session);

        // then
        assert!(matches!(result, Err(Error::NoSignerAvailable)));
    }

    #[test]
    fn require_signer__session_from_other_chain__fails_with_network_mismatch() {
        // given
        let gate = gate(FakeWallet::new(FakeChain::default(), arb_address(1), TARGET));
        let stale = WalletSession {
            address: arb_address(1),
            chain_id: 5,
            signing_capability: true,
        };

        // when
        let result = gate.require_signer(&stale);

        // then
        assert!(matches!(result, Err(Error::NetworkMismatch { .. })));
    }

    #[tokio::test]
    async fn signing_handle__send__addresses_contract_from_session_account() {
        // given
        let chain = FakeChain::default();
        let gate = gate(FakeWallet::new(chain.clone(), arb_address(1), TARGET));
        let session = WalletSession {
            address: arb_address(1),
            chain_id: TARGET,
            signing_capability: true,
        };
        let signer = gate.require_signer(&session).unwrap();

        // when
        signer
            .send(
                arb_address(2),
                Bytes::from(vec![0xd4, 0xf7, 0x7b, 0x1c]),
                Wei::from(1000),
            )
            .await
            .unwrap();

        // then
        let sent = chain.with_state(|s| s.sent.clone());
        let json = serde_json::to_value(&sent[0]).unwrap();
        assert_eq!(json["data"], "0xd4f77b1c");
        assert_eq!(json["value"], "0x3e8");
        assert_eq!(json["from"], format!("{:?}", arb_address(1)));
        assert_eq!(json["to"], format!("{:?}", arb_address(2)));
    }
}
