//! Locally signed transfers submitted with `eth_sendRawTransaction`.
//!
//! Transactions are `alloy_consensus` legacy transactions with EIP-155
//! replay protection and a zero gas price, which is what permissioned
//! clusters accept. Signing goes through [`TransactionSigner`] so scenarios
//! do not care where the key lives.

use std::path::Path;

use alloy_consensus::{SignableTransaction, TxLegacy};
use alloy_core::primitives::{Address, B256, Bytes, PrimitiveSignature, TxKind, U256, keccak256};
use alloy_signer_local::PrivateKeySigner;
use k256::{ecdsa::SigningKey, elliptic_curve::sec1::ToEncodedPoint};

use crate::{
    HarnessError, HarnessResult,
    context::HarnessContext,
    contract::DEFAULT_GAS_LIMIT,
    error::{ensure_eq, ensure_ne},
    finality::wait_for_receipt,
    registry::NodeId,
    rpc::BlockTag,
};

/// Value (wei) carried by each signed transfer.
const SIGNED_TRANSFER_VALUE: u64 = 1;

/// Zero-gas-price EIP-155 transfer of `value` to `to`.
pub fn legacy_transfer(chain_id: u64, nonce: u64, to: Address, value: U256) -> TxLegacy {
    TxLegacy {
        chain_id: Some(chain_id),
        nonce,
        gas_price: 0,
        gas_limit: DEFAULT_GAS_LIMIT,
        to: TxKind::Call(to),
        value,
        input: Bytes::new(),
    }
}

/// Produces raw signed transactions for one account.
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Address;

    fn sign_transaction(&self, tx: TxLegacy) -> HarnessResult<Bytes>;
}

/// Signer backed by a secp256k1 key, usually decrypted from a keystore file.
#[derive(Clone)]
pub struct KeystoreSigner {
    key: SigningKey,
    address: Address,
}

impl std::fmt::Debug for KeystoreSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeystoreSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl KeystoreSigner {
    pub fn new(key: SigningKey) -> Self {
        let point = key.verifying_key().as_affine().to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let address = Address::from_slice(&hash[12..]);
        Self { key, address }
    }

    pub fn from_bytes(secret: &[u8]) -> HarnessResult<Self> {
        let key = SigningKey::from_slice(secret)
            .map_err(|e| HarnessError::Signing(format!("invalid private key: {}", e)))?;
        Ok(Self::new(key))
    }

    /// Decrypt a JSON keystore file.
    pub fn from_keystore(path: &Path, password: &str) -> HarnessResult<Self> {
        if !path.exists() {
            return Err(HarnessError::config(format!(
                "keystore file not found: {}",
                path.display()
            )));
        }
        let signer = PrivateKeySigner::decrypt_keystore(path, password).map_err(|e| {
            HarnessError::Signing(format!("failed to decrypt {}: {}", path.display(), e))
        })?;
        Ok(Self::new(signer.credential().clone()))
    }
}

impl TransactionSigner for KeystoreSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_transaction(&self, tx: TxLegacy) -> HarnessResult<Bytes> {
        let hash = tx.signature_hash();
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(hash.as_slice())
            .map_err(|e| HarnessError::Signing(e.to_string()))?;

        let signature = PrimitiveSignature::new(
            U256::from_be_slice(signature.r().to_bytes().as_slice()),
            U256::from_be_slice(signature.s().to_bytes().as_slice()),
            recovery_id.is_y_odd(),
        );
        let mut raw = Vec::new();
        tx.into_signed(signature).rlp_encode(&mut raw);
        Ok(Bytes::from(raw))
    }
}

/// Observed effect of one signed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransferOutcome {
    pub origin: NodeId,
    pub destination: NodeId,
    pub tx_hash: B256,
    pub nonce: u64,
    pub block_number_before: u64,
    pub block_number: u64,
    pub block_hash: B256,
}

/// Sign with the origin's keystore (`key<N>`, empty password) and send one
/// transfer to every other node.
pub async fn run_signed(ctx: &HarnessContext, origin: NodeId) -> HarnessResult<Vec<SignedTransferOutcome>> {
    let key_file = ctx.config().key_file(origin).ok_or_else(|| {
        HarnessError::config("keys_dir must be set to run signed transactions")
    })?;
    let signer = KeystoreSigner::from_keystore(&key_file, "")?;
    run_signed_with(ctx, origin, &signer).await
}

pub async fn run_signed_with(
    ctx: &HarnessContext,
    origin: NodeId,
    signer: &dyn TransactionSigner,
) -> HarnessResult<Vec<SignedTransferOutcome>> {
    let origin_node = ctx.node(origin)?;
    let client = ctx.client(origin)?;

    if signer.address() != origin_node.account {
        return Err(HarnessError::config(format!(
            "key for {} belongs to {}, expected {}",
            origin,
            signer.address(),
            origin_node.account
        )));
    }

    let mut outcomes = Vec::new();
    for destination in ctx.registry().others(origin) {
        let context = format!("{} -> {} signed", origin, destination.id);

        let nonce = client
            .get_transaction_count(origin_node.account, BlockTag::Pending)
            .await?;
        let tx = legacy_transfer(
            ctx.config().chain_id,
            nonce,
            destination.account,
            U256::from(SIGNED_TRANSFER_VALUE),
        );
        let raw = signer.sign_transaction(tx)?;

        let block_number_before = client.block_number().await?;
        tracing::debug!(origin = %origin, destination = %destination.id, nonce, "Sending signed transaction");

        let tx_hash = client.send_raw_transaction(&raw).await?;
        wait_for_receipt(client, tx_hash, ctx.finality()).await?;

        let mined = client.get_transaction(tx_hash).await?.ok_or_else(|| {
            HarnessError::assertion(&context, "transaction not found after receipt", tx_hash, "null")
        })?;

        let block_hash = mined.block_hash.unwrap_or_default();
        let block_number = mined.block_number.unwrap_or_default();
        ensure_ne(&context, "block hash is empty", B256::ZERO, block_hash)?;
        ensure_ne(&context, "block number is zero", 0, block_number)?;
        ensure_ne(
            &context,
            "block number did not change",
            block_number_before,
            block_number,
        )?;
        ensure_eq(&context, "sender does not match", origin_node.account, mined.from)?;

        tracing::info!(
            origin = %origin,
            destination = %destination.id,
            tx_hash = %tx_hash,
            block = block_number,
            "Signed transaction confirmed"
        );

        outcomes.push(SignedTransferOutcome {
            origin,
            destination: destination.id,
            tx_hash,
            nonce,
            block_number_before,
            block_number,
            block_hash,
        });
    }

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use alloy_core::{
        primitives::{address, hex},
        rlp::{Decodable, Header},
    };
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    use super::*;

    // Transaction from the EIP-155 example.
    fn eip155_example() -> TxLegacy {
        TxLegacy {
            chain_id: Some(1),
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            to: TxKind::Call(address!("3535353535353535353535353535353535353535")),
            value: U256::from(1_000_000_000_000_000_000u64),
            input: Bytes::new(),
        }
    }

    #[test]
    fn test_eip155_signing_hash() {
        assert_eq!(
            eip155_example().signature_hash(),
            B256::from(hex!(
                "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
            ))
        );
    }

    #[test]
    fn test_legacy_transfer_fields() {
        let to = Address::with_last_byte(7);
        let tx = legacy_transfer(10, 3, to, U256::from(1));
        assert_eq!(tx.chain_id, Some(10));
        assert_eq!(tx.nonce, 3);
        assert_eq!(tx.gas_price, 0);
        assert_eq!(tx.gas_limit, DEFAULT_GAS_LIMIT);
        assert_eq!(tx.to, TxKind::Call(to));
        assert!(tx.input.is_empty());
    }

    #[test]
    fn test_address_from_private_key() {
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let signer = KeystoreSigner::from_bytes(&secret).unwrap();
        assert_eq!(
            signer.address(),
            address!("7e5f4552091a69125d5dfcb7b8c2659029395bdf")
        );
    }

    #[test]
    fn test_signature_recovers_signer() {
        let signer = KeystoreSigner::from_bytes(&[0x46; 32]).unwrap();
        let tx = TxLegacy {
            chain_id: Some(10),
            ..eip155_example()
        };
        let hash = tx.signature_hash();
        let raw = signer.sign_transaction(tx.clone()).unwrap();

        let mut buf = &raw[..];
        let header = Header::decode(&mut buf).unwrap();
        assert!(header.list);
        assert_eq!(u64::decode(&mut buf).unwrap(), tx.nonce);
        assert_eq!(u128::decode(&mut buf).unwrap(), tx.gas_price);
        assert_eq!(u64::decode(&mut buf).unwrap(), tx.gas_limit);
        assert_eq!(TxKind::Call(Address::decode(&mut buf).unwrap()), tx.to);
        assert_eq!(U256::decode(&mut buf).unwrap(), tx.value);
        assert_eq!(Bytes::decode(&mut buf).unwrap(), tx.input);
        let v = u64::decode(&mut buf).unwrap();
        let r = U256::decode(&mut buf).unwrap();
        let s = U256::decode(&mut buf).unwrap();
        assert!(buf.is_empty());
        assert!(v == 55 || v == 56, "unexpected v {}", v);

        let signature =
            Signature::from_scalars(r.to_be_bytes::<32>(), s.to_be_bytes::<32>()).unwrap();
        let recovery_id = RecoveryId::from_byte((v - 35 - 2 * 10) as u8).unwrap();
        let recovered =
            VerifyingKey::recover_from_prehash(hash.as_slice(), &signature, recovery_id).unwrap();
        assert_eq!(&recovered, signer.key.verifying_key());
    }

    #[test]
    fn test_missing_keystore_is_config_error() {
        let err = KeystoreSigner::from_keystore(Path::new("/no/such/key1"), "").unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }
}
