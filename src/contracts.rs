//! Contract ABI definitions
//!
//! Uses alloy's sol! macro to generate type-safe bindings for the bridge
//! contract (owned by the Safe) and the Safe multisig itself.

#![allow(clippy::too_many_arguments)]

use alloy::sol;

sol! {
    /// Bridge contract controlled by the Safe
    contract Bridge {
        /// Mint wrapped tokens for a lock observed on the native ledger
        ///
        /// # Arguments
        /// * `token` - Wrapped token contract
        /// * `recipient` - EVM recipient
        /// * `amount` - Amount in wrapped-token decimals, fees already deducted
        /// * `depositTxId` - Native ledger transaction id of the lock
        function mint(
            address token,
            address recipient,
            uint256 amount,
            string memory depositTxId
        ) external;

        /// Burn wrapped tokens to release them on the native ledger
        function burn(address token, string memory destination, uint256 amount) external;

        /// Emitted by `burn`
        event Burn(
            address indexed token,
            address indexed sender,
            string destination,
            uint256 amount
        );
    }
}

sol! {
    /// Safe multisig view used by the relay
    #[sol(rpc)]
    interface ISafe {
        /// Returns the current nonce of the Safe
        function nonce() external view returns (uint256);
    }
}

sol! {
    /// EIP-712 struct signed by Safe owners
    struct SafeTx {
        address to;
        uint256 value;
        bytes data;
        uint8 operation;
        uint256 safeTxGas;
        uint256 baseGas;
        uint256 gasPrice;
        address gasToken;
        address refundReceiver;
        uint256 nonce;
    }
}
