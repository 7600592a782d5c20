//! Test contracts deployed by the visibility and storage-root suites.

use alloy_core::primitives::{Bytes, U256, hex, keccak256};

/// Gas limit used for deployments and contract calls.
pub const DEFAULT_GAS_LIMIT: u64 = 4_700_000;

/// Init code of a contract with a single `emitEvent()` method that
/// increments a counter and emits `TestEvent(uint256 count)`.
const EVENT_EMITTER_CODE: &[u8] = &hex!(
    "608060405260008055348015601357600080fd5b5060cc806100226000396000f300608060405260043610603f576000357c0100000000000000000000000000000000000000000000000000000000900463ffffffff1680637b0cb839146044575b600080fd5b348015604f57600080fd5b5060566058565b005b7f1440c4dd67b4344ea1905ec0318995133b550f168b4ee959a0da6b503d7d2414600080815480929190600101919050556040518082815260200191505060405180910390a15600a165627a7a72305820d0a22dbf268334eae6006b4d59e1f355fb738aa82345685173a2cc90fc6f085c0029"
);

/// Init code of `SimpleStorage(uint256 initVal)` with `get()`, `set(uint256)`
/// and a public `storedData`, without constructor arguments.
const SIMPLE_STORAGE_CODE: &[u8] = &hex!(
    "6060604052341561000f57600080fd5b604051602080610149833981016040528080519060200190919050505b806000819055505b505b610104806100456000396000f30060606040526000357c0100000000000000000000000000000000000000000000000000000000900463ffffffff1680632a1afcd914605157806360fe47b11460775780636d4ce63c146097575b600080fd5b3415605b57600080fd5b606160bd565b6040518082815260200191505060405180910390f35b3415608157600080fd5b6095600480803590602001909190505060c3565b005b341560a157600080fd5b60a760ce565b6040518082815260200191505060405180910390f35b60005481565b806000819055505b50565b6000805490505b905600a165627a7a72305820d5851baab720bba574474de3d09dbeaabc674a15f4dd93b974908476542c23f00029"
);

/// Signature of the event emitter's state-changing method.
pub const EMIT_EVENT_SIGNATURE: &str = "emitEvent()";

/// First four bytes of the keccak hash of a method signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn event_emitter_code() -> Bytes {
    Bytes::from_static(EVENT_EMITTER_CODE)
}

pub fn emit_event_calldata() -> Bytes {
    Bytes::copy_from_slice(&selector(EMIT_EVENT_SIGNATURE))
}

/// `SimpleStorage` init code with `initial` ABI-encoded as constructor argument.
pub fn simple_storage_code(initial: u64) -> Bytes {
    let mut code = SIMPLE_STORAGE_CODE.to_vec();
    code.extend_from_slice(&U256::from(initial).to_be_bytes::<32>());
    Bytes::from(code)
}
