//! Fee engine: converts bridged amounts between ledger precisions
//!
//! Mint: `floor((input - cost * 10^precision) * 10^(evm_decimals - precision) * (10000 - mint_fee) / 10000)`
//!
//! Release: `floor(input * 10^(precision - evm_decimals) * (10000 - burn_fee) / 10000)`
//!
//! All intermediate arithmetic is exact; the only rounding step is the final
//! truncation toward zero, which always favors the bridge.

use alloy::primitives::U256;
use bigdecimal::{BigDecimal, Signed};
use std::str::FromStr;

use crate::error::BridgeError;
use crate::types::{FeeSchedule, Operation, OperationKind, Token, BPS_DENOMINATOR};

/// Largest decimal count a uint256 amount can meaningfully carry
pub const MAX_DECIMALS: u8 = 77;

/// Check that both fees are valid basis-point values in `[0, 10000)`.
pub fn validate_schedule(schedule: &FeeSchedule) -> Result<(), BridgeError> {
    if schedule.mint_fee_bps >= BPS_DENOMINATOR {
        return Err(BridgeError::InvalidConfiguration(format!(
            "mint fee {} bps must be below {}",
            schedule.mint_fee_bps, BPS_DENOMINATOR
        )));
    }
    if schedule.burn_fee_bps >= BPS_DENOMINATOR {
        return Err(BridgeError::InvalidConfiguration(format!(
            "burn fee {} bps must be below {}",
            schedule.burn_fee_bps, BPS_DENOMINATOR
        )));
    }
    Ok(())
}

/// Check the token metadata the fee computation depends on.
pub fn validate_token(token: &Token) -> Result<(), BridgeError> {
    if token.precision > MAX_DECIMALS || token.evm_decimals > MAX_DECIMALS {
        return Err(BridgeError::InvalidConfiguration(format!(
            "token {} has out-of-range decimals (precision {}, evm decimals {})",
            token.url, token.precision, token.evm_decimals
        )));
    }
    if token.operational_cost.is_negative() {
        return Err(BridgeError::InvalidConfiguration(format!(
            "token {} has a negative operational cost",
            token.url
        )));
    }
    Ok(())
}

/// Apply the fee schedule to an operation, filling in its output amount.
pub fn apply(mut op: Operation, schedule: &FeeSchedule) -> Result<Operation, BridgeError> {
    validate_schedule(schedule)?;
    validate_token(&op.token)?;

    let input = to_decimal(op.input);
    let precision = i64::from(op.token.precision);
    let evm_decimals = i64::from(op.token.evm_decimals);

    let (pre_fee, ratio_exp, fee_bps) = match op.kind {
        OperationKind::Mint => {
            let cost = &op.token.operational_cost * pow10(precision);
            let pre_fee = input - cost;
            if !pre_fee.is_positive() {
                return Err(BridgeError::insufficient(format!(
                    "{} {} does not cover the operational cost of {} {}",
                    op.input, op.token.symbol, op.token.operational_cost, op.token.symbol
                )));
            }
            (pre_fee, evm_decimals - precision, schedule.mint_fee_bps)
        }
        OperationKind::Release => (input, precision - evm_decimals, schedule.burn_fee_bps),
    };

    let after_fee = BigDecimal::new((BPS_DENOMINATOR - fee_bps).into(), 4);
    let output = (pre_fee * pow10(ratio_exp) * after_fee).with_scale(0);

    if !output.is_positive() {
        return Err(BridgeError::insufficient(format!(
            "{} of {} {} rounds to zero after fees",
            op.kind, op.input, op.token.symbol
        )));
    }

    op.output = to_u256(&output)?;
    Ok(op)
}

/// `10^exp` as an exact decimal (negative exponents included)
fn pow10(exp: i64) -> BigDecimal {
    BigDecimal::new(1.into(), -exp)
}

fn to_decimal(value: U256) -> BigDecimal {
    // U256 always renders as plain decimal digits
    BigDecimal::from_str(&value.to_string()).unwrap_or_default()
}

fn to_u256(value: &BigDecimal) -> Result<U256, BridgeError> {
    let (digits, _) = value.with_scale(0).as_bigint_and_exponent();
    U256::from_str(&digits.to_string()).map_err(|e| {
        BridgeError::InvalidConfiguration(format!("amount {} exceeds uint256: {}", digits, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;

    const E8: u64 = 100_000_000;

    fn token(precision: u8, evm_decimals: u8, cost: &str) -> Token {
        Token {
            url: "acc://bridge.acme/tokens/wbtc".to_string(),
            symbol: "WBTC".to_string(),
            precision,
            evm_address: Address::repeat_byte(0x11),
            evm_decimals,
            operational_cost: cost.parse().unwrap(),
        }
    }

    fn schedule() -> FeeSchedule {
        FeeSchedule::new(10, 10)
    }

    #[test]
    fn test_mint_subtracts_cost_and_fee() {
        // 1000 units, 50 units cost, 10 bps: (1000 - 50) * 0.999 = 949.05
        let op = Operation::mint(token(8, 8, "50"), U256::from(1000 * E8));
        let result = apply(op, &schedule()).unwrap();
        assert_eq!(result.output, U256::from(94_905_000_000u64));
    }

    #[test]
    fn test_mint_truncates_fraction_when_decimals_shrink() {
        // (1000 - 0.5) * 0.999 = 998.5005 whole tokens, evm side has 0 decimals
        let op = Operation::mint(token(8, 0, "0.5"), U256::from(1000 * E8));
        let result = apply(op, &schedule()).unwrap();
        assert_eq!(result.output, U256::from(998u64));
    }

    #[test]
    fn test_mint_barely_covering_cost_rounds_to_zero() {
        // 51 - 50 = 1 whole token, * 0.999 = 0.999 -> floors to 0
        let op = Operation::mint(token(8, 0, "50"), U256::from(51 * E8));
        let err = apply(op, &schedule()).unwrap_err();
        assert!(matches!(err, BridgeError::InsufficientAmount { .. }), "{}", err);
    }

    #[test]
    fn test_mint_above_cost_with_equal_decimals_is_positive() {
        let op = Operation::mint(token(8, 8, "50"), U256::from(51 * E8));
        let result = apply(op, &schedule()).unwrap();
        assert_eq!(result.output, U256::from(99_900_000u64));
    }

    #[test]
    fn test_mint_below_cost_is_insufficient() {
        let op = Operation::mint(token(8, 8, "50"), U256::from(50 * E8));
        assert!(matches!(
            apply(op, &schedule()),
            Err(BridgeError::InsufficientAmount { .. })
        ));

        let op = Operation::mint(token(8, 8, "50"), U256::from(E8));
        assert!(matches!(
            apply(op, &schedule()),
            Err(BridgeError::InsufficientAmount { .. })
        ));
    }

    #[test]
    fn test_mint_scales_up_to_more_decimals() {
        // 8 -> 18 decimals: (2 - 1) tokens * 0.999 = 0.999e18
        let op = Operation::mint(token(8, 18, "1"), U256::from(2 * E8));
        let result = apply(op, &schedule()).unwrap();
        assert_eq!(result.output, U256::from(999_000_000_000_000_000u64));
    }

    #[test]
    fn test_mint_fee_floor_boundary() {
        // 10001 smallest units * 0.999 = 9990.999 -> 9990, never 9991
        let op = Operation::mint(token(0, 0, "0"), U256::from(10_001u64));
        let result = apply(op, &schedule()).unwrap();
        assert_eq!(result.output, U256::from(9_990u64));

        // exact multiple has no fractional part
        let op = Operation::mint(token(0, 0, "0"), U256::from(10_000u64));
        assert_eq!(apply(op, &schedule()).unwrap().output, U256::from(9_990u64));
    }

    #[test]
    fn test_mint_single_unit_with_fee_is_insufficient() {
        // 1 * 0.999 = 0.999 -> 0
        let op = Operation::mint(token(0, 0, "0"), U256::from(1u64));
        assert!(matches!(
            apply(op, &schedule()),
            Err(BridgeError::InsufficientAmount { .. })
        ));

        // without a fee the single unit survives
        let op = Operation::mint(token(0, 0, "0"), U256::from(1u64));
        assert_eq!(
            apply(op, &FeeSchedule::new(0, 0)).unwrap().output,
            U256::from(1u64)
        );
    }

    #[test]
    fn test_release_has_no_operational_cost() {
        // 18 -> 8 decimals, 10 bps: 5e18 * 1e-10 * 0.999 = 4.995e8
        let op = Operation::release(token(8, 18, "50"), U256::from(5_000_000_000_000_000_000u64));
        let result = apply(op, &schedule()).unwrap();
        assert_eq!(result.output, U256::from(499_500_000u64));
    }

    #[test]
    fn test_release_dust_below_origin_precision() {
        // 18 -> 8 decimals: 9_999_999_999 wei is 0.9999999999e-8 tokens -> 0
        let op = Operation::release(token(8, 18, "0"), U256::from(9_999_999_999u64));
        assert!(matches!(
            apply(op, &FeeSchedule::new(0, 0)),
            Err(BridgeError::InsufficientAmount { .. })
        ));

        // 19_999_999_999 wei -> 1.9999999999 units -> 1
        let op = Operation::release(token(8, 18, "0"), U256::from(19_999_999_999u64));
        assert_eq!(
            apply(op, &FeeSchedule::new(0, 0)).unwrap().output,
            U256::from(1u64)
        );
    }

    #[test]
    fn test_release_uses_burn_fee() {
        let op = Operation::release(token(8, 8, "0"), U256::from(100 * E8));
        let result = apply(op, &FeeSchedule::new(0, 250)).unwrap();
        // 2.5% of 100 tokens
        assert_eq!(result.output, U256::from(97 * E8 + E8 / 2));
    }

    #[test]
    fn test_invalid_fee_schedule_rejected() {
        let op = Operation::mint(token(8, 8, "0"), U256::from(E8));
        assert!(matches!(
            apply(op.clone(), &FeeSchedule::new(10_000, 0)),
            Err(BridgeError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            apply(op, &FeeSchedule::new(0, 10_001)),
            Err(BridgeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_invalid_token_metadata_rejected() {
        let op = Operation::mint(token(8, 78, "0"), U256::from(E8));
        assert!(matches!(
            apply(op, &schedule()),
            Err(BridgeError::InvalidConfiguration(_))
        ));

        let op = Operation::mint(token(8, 8, "-1"), U256::from(E8));
        assert!(matches!(
            apply(op, &schedule()),
            Err(BridgeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_mint_output_always_positive() {
        let amounts = [1u64, 99, 10_000, 5 * E8, 50 * E8, 50 * E8 + 1, 123_456_789_012];
        for fee in [0u32, 1, 10, 500, 9_999] {
            for amount in amounts {
                let op = Operation::mint(token(8, 6, "50"), U256::from(amount));
                match apply(op, &FeeSchedule::new(fee, 0)) {
                    Ok(result) => assert!(result.output > U256::ZERO),
                    Err(BridgeError::InsufficientAmount { .. }) => {}
                    Err(other) => panic!("unexpected error: {}", other),
                }
            }
        }
    }
}
