//! Fee schedule: policy resolution and fee computation
//!
//! A [`FeeSchedule`] is an ordered list of [`FeeRule`]s plus a default policy.
//! Resolution picks the matching rule with the highest specificity (earliest
//! rule wins ties) and falls back to the default. Every policy is validated
//! when the schedule is built, so resolution cannot return a policy whose
//! calculation is undefined for some amount.
//!
//! [`compute_fee_amount`] is a pure function of (policy, amount). It still
//! re-checks its inputs because callers may pass hand-built policies; an
//! undefined result is a [`TransferError::FeeCalculation`], never a default.

use crate::core::traits::FeeResolver;
use crate::types::{
    FeeBracket, FeeCalculation, FeeConfigError, FeePolicy, FeeRule, Money, Region, Tier,
    TransactionKind, TransferError,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::cmp::Reverse;
use std::path::Path;
use tracing::debug;

/// Validated set of fee rules
#[derive(Debug, Clone)]
pub struct FeeSchedule {
    rules: Vec<FeeRule>,
    default_policy: FeePolicy,
}

/// On-disk layout of a fee schedule
#[derive(Debug, Deserialize)]
struct FeeScheduleFile {
    default: FeePolicy,
    #[serde(default)]
    rules: Vec<FeeRule>,
}

impl FeeSchedule {
    /// Build a schedule, rejecting any malformed policy or rule
    pub fn new(rules: Vec<FeeRule>, default_policy: FeePolicy) -> Result<Self, FeeConfigError> {
        validate_policy(&default_policy)?;
        for (index, rule) in rules.iter().enumerate() {
            if let (Some(min), Some(max)) = (rule.min_amount, rule.max_amount) {
                if min >= max {
                    return Err(FeeConfigError::InvalidRule {
                        index,
                        reason: format!("min_amount {} is not below max_amount {}", min, max),
                    });
                }
            }
            validate_policy(&rule.policy)?;
        }

        Ok(Self {
            rules,
            default_policy,
        })
    }

    /// Parse a schedule from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, FeeConfigError> {
        let file: FeeScheduleFile =
            serde_yaml::from_str(yaml).map_err(|e| FeeConfigError::Parse(e.to_string()))?;
        Self::new(file.rules, file.default)
    }

    /// Load a schedule from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self, FeeConfigError> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| FeeConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&yaml)
    }

    /// Built-in schedule used when no schedule file is configured
    ///
    /// - STANDARD transfers: flat 1.50
    /// - PREMIUM transfers: 0.5%, at least 0.50, at most 5.00
    /// - BUSINESS transfers: 0.50 up to 100.00, 0.25% up to 1000.00,
    ///   then 2.00 + 0.1%
    /// - anything else: free
    pub fn standard() -> Self {
        let transfer_rule = |tier: Tier, policy: FeePolicy| FeeRule {
            transaction_kind: TransactionKind::Transfer,
            tier: Some(tier),
            region: None,
            min_amount: None,
            max_amount: None,
            policy,
        };

        let rules = vec![
            transfer_rule(
                Tier::Standard,
                FeePolicy {
                    name: "standard-transfer".to_string(),
                    description: "Standard transfer fee".to_string(),
                    calculation: FeeCalculation::Flat {
                        amount: Money::from_minor(150),
                    },
                },
            ),
            transfer_rule(
                Tier::Premium,
                FeePolicy {
                    name: "premium-transfer".to_string(),
                    description: "Premium transfer fee (0.5%)".to_string(),
                    calculation: FeeCalculation::Percentage {
                        rate: Decimal::new(5, 3),
                        minimum: Some(Money::from_minor(50)),
                        maximum: Some(Money::from_minor(500)),
                    },
                },
            ),
            transfer_rule(
                Tier::Business,
                FeePolicy {
                    name: "business-transfer".to_string(),
                    description: "Business transfer fee".to_string(),
                    calculation: FeeCalculation::Tiered {
                        brackets: vec![
                            FeeBracket {
                                up_to: Some(Money::from_minor(10_000)),
                                flat: Some(Money::from_minor(50)),
                                rate: None,
                            },
                            FeeBracket {
                                up_to: Some(Money::from_minor(100_000)),
                                flat: None,
                                rate: Some(Decimal::new(25, 4)),
                            },
                            FeeBracket {
                                up_to: None,
                                flat: Some(Money::from_minor(200)),
                                rate: Some(Decimal::new(1, 3)),
                            },
                        ],
                    },
                },
            ),
        ];

        Self {
            rules,
            default_policy: FeePolicy::free("no-fee", "No fee applies"),
        }
    }

    pub fn rules(&self) -> &[FeeRule] {
        &self.rules
    }

    pub fn default_policy(&self) -> &FeePolicy {
        &self.default_policy
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::standard()
    }
}

impl FeeResolver for FeeSchedule {
    fn resolve_fee(
        &self,
        kind: TransactionKind,
        amount: Money,
        tier: Tier,
        region: &Region,
    ) -> FeePolicy {
        let best = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.matches(kind, amount, tier, region))
            .max_by_key(|(index, rule)| (rule.specificity(), Reverse(*index)));

        match best {
            Some((index, rule)) => {
                debug!(rule = index, policy = %rule.policy.name, "fee rule matched");
                rule.policy.clone()
            }
            None => {
                debug!(policy = %self.default_policy.name, "no fee rule matched, using default");
                self.default_policy.clone()
            }
        }
    }
}

fn check_rate(policy: &FeePolicy, rate: Decimal) -> Result<(), FeeConfigError> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(FeeConfigError::invalid_policy(
            &policy.name,
            format!("rate {} outside [0, 1]", rate),
        ));
    }
    Ok(())
}

fn check_non_negative(policy: &FeePolicy, what: &str, value: Money) -> Result<(), FeeConfigError> {
    if value.is_negative() {
        return Err(FeeConfigError::invalid_policy(
            &policy.name,
            format!("{} {} is negative", what, value),
        ));
    }
    Ok(())
}

/// Check that a policy's calculation is defined for every positive amount
pub fn validate_policy(policy: &FeePolicy) -> Result<(), FeeConfigError> {
    match &policy.calculation {
        FeeCalculation::Flat { amount } => check_non_negative(policy, "flat fee", *amount),
        FeeCalculation::Percentage {
            rate,
            minimum,
            maximum,
        } => {
            check_rate(policy, *rate)?;
            if let Some(min) = minimum {
                check_non_negative(policy, "minimum", *min)?;
            }
            if let Some(max) = maximum {
                check_non_negative(policy, "maximum", *max)?;
            }
            if let (Some(min), Some(max)) = (minimum, maximum) {
                if min > max {
                    return Err(FeeConfigError::invalid_policy(
                        &policy.name,
                        format!("minimum {} exceeds maximum {}", min, max),
                    ));
                }
            }
            Ok(())
        }
        FeeCalculation::Tiered { brackets } => {
            if brackets.is_empty() {
                return Err(FeeConfigError::invalid_policy(&policy.name, "tiered table is empty"));
            }
            let last = brackets.len() - 1;
            let mut previous: Option<Money> = None;
            for (index, bracket) in brackets.iter().enumerate() {
                if let Some(flat) = bracket.flat {
                    check_non_negative(policy, "bracket flat fee", flat)?;
                }
                if let Some(rate) = bracket.rate {
                    check_rate(policy, rate)?;
                }
                match bracket.up_to {
                    Some(up_to) => {
                        if index == last {
                            return Err(FeeConfigError::invalid_policy(
                                &policy.name,
                                "last bracket must be open-ended",
                            ));
                        }
                        if previous.is_some_and(|prev| up_to <= prev) {
                            return Err(FeeConfigError::invalid_policy(
                                &policy.name,
                                format!("bracket {} is not ascending", index),
                            ));
                        }
                        previous = Some(up_to);
                    }
                    None if index != last => {
                        return Err(FeeConfigError::invalid_policy(
                            &policy.name,
                            format!("bracket {} is open-ended but not last", index),
                        ));
                    }
                    None => {}
                }
            }
            Ok(())
        }
    }
}

fn percentage_of(policy: &FeePolicy, amount: Money, rate: Decimal) -> Result<Decimal, TransferError> {
    amount
        .amount()
        .checked_mul(rate)
        .ok_or_else(|| TransferError::fee_calculation(&policy.name, "percentage overflowed"))
}

/// Fee for `amount` under `policy`, rounded half away from zero to cents
pub fn compute_fee_amount(policy: &FeePolicy, amount: Money) -> Result<Money, TransferError> {
    let fee = match &policy.calculation {
        FeeCalculation::Flat { amount: flat } => *flat,
        FeeCalculation::Percentage {
            rate,
            minimum,
            maximum,
        } => {
            let mut fee = Money::round_from(percentage_of(policy, amount, *rate)?);
            if let Some(min) = minimum {
                fee = fee.max(*min);
            }
            if let Some(max) = maximum {
                fee = fee.min(*max);
            }
            if let (Some(min), Some(max)) = (minimum, maximum) {
                if min > max {
                    return Err(TransferError::fee_calculation(
                        &policy.name,
                        "minimum exceeds maximum",
                    ));
                }
            }
            fee
        }
        FeeCalculation::Tiered { brackets } => {
            let bracket = brackets
                .iter()
                .find(|bracket| bracket.up_to.is_none_or(|up_to| amount <= up_to))
                .ok_or_else(|| {
                    TransferError::fee_calculation(
                        &policy.name,
                        format!("no bracket covers {}", amount),
                    )
                })?;
            let variable = match bracket.rate {
                Some(rate) => percentage_of(policy, amount, rate)?,
                None => Decimal::ZERO,
            };
            let flat = bracket.flat.map(|flat| flat.amount()).unwrap_or(Decimal::ZERO);
            let total = flat
                .checked_add(variable)
                .ok_or_else(|| TransferError::fee_calculation(&policy.name, "fee overflowed"))?;
            Money::round_from(total)
        }
    };

    if fee.is_negative() {
        return Err(TransferError::fee_calculation(
            &policy.name,
            format!("negative fee {}", fee),
        ));
    }
    Ok(fee)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    fn resolve(schedule: &FeeSchedule, amount: &str, tier: Tier) -> FeePolicy {
        schedule.resolve_fee(TransactionKind::Transfer, money(amount), tier, &Region::global())
    }

    #[rstest]
    #[case::standard_flat(Tier::Standard, "40.00", "1.50", "flat")]
    #[case::premium_percentage(Tier::Premium, "400.00", "2.00", "percentage")]
    #[case::premium_minimum(Tier::Premium, "10.00", "0.50", "percentage")]
    #[case::premium_maximum(Tier::Premium, "5000.00", "5.00", "percentage")]
    #[case::business_low_bracket(Tier::Business, "100.00", "0.50", "tiered")]
    #[case::business_mid_bracket(Tier::Business, "500.00", "1.25", "tiered")]
    #[case::business_open_bracket(Tier::Business, "2000.00", "4.00", "tiered")]
    fn test_standard_schedule(
        #[case] tier: Tier,
        #[case] amount: &str,
        #[case] expected_fee: &str,
        #[case] expected_type: &str,
    ) {
        let schedule = FeeSchedule::standard();
        let policy = resolve(&schedule, amount, tier);
        assert_eq!(policy.fee_type(), expected_type);
        let fee = schedule.compute_fee_amount(&policy, money(amount)).unwrap();
        assert_eq!(fee, money(expected_fee));
    }

    #[test]
    fn test_unmatched_kind_falls_back_to_default() {
        let schedule = FeeSchedule::standard();
        let policy = schedule.resolve_fee(
            TransactionKind::Withdrawal,
            money("10.00"),
            Tier::Standard,
            &Region::global(),
        );
        assert_eq!(policy.name, "no-fee");
        assert_eq!(compute_fee_amount(&policy, money("10.00")).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_most_specific_rule_wins() {
        let yaml = r#"
default:
  name: no-fee
  description: No fee applies
  calculation: { kind: flat, amount: "0.00" }
rules:
  - transaction_kind: transfer
    policy:
      name: any-transfer
      description: Any transfer
      calculation: { kind: flat, amount: "1.00" }
  - transaction_kind: transfer
    tier: STANDARD
    region: eu
    policy:
      name: eu-standard
      description: EU standard transfer
      calculation: { kind: flat, amount: "0.75" }
  - transaction_kind: transfer
    tier: STANDARD
    policy:
      name: standard
      description: Standard transfer
      calculation: { kind: flat, amount: "1.50" }
"#;
        let schedule = FeeSchedule::from_yaml(yaml).unwrap();

        let eu = schedule.resolve_fee(
            TransactionKind::Transfer,
            money("10.00"),
            Tier::Standard,
            &Region::new("EU"),
        );
        assert_eq!(eu.name, "eu-standard");

        let global = resolve(&schedule, "10.00", Tier::Standard);
        assert_eq!(global.name, "standard");

        let premium = resolve(&schedule, "10.00", Tier::Premium);
        assert_eq!(premium.name, "any-transfer");
    }

    #[test]
    fn test_equal_specificity_prefers_earlier_rule() {
        let first = FeeRule {
            transaction_kind: TransactionKind::Transfer,
            tier: Some(Tier::Standard),
            region: None,
            min_amount: None,
            max_amount: None,
            policy: FeePolicy::free("first", "first"),
        };
        let mut second = first.clone();
        second.policy = FeePolicy::free("second", "second");

        let schedule =
            FeeSchedule::new(vec![first, second], FeePolicy::free("default", "default")).unwrap();
        assert_eq!(resolve(&schedule, "5.00", Tier::Standard).name, "first");
    }

    #[rstest]
    #[case::empty_tiers(FeeCalculation::Tiered { brackets: vec![] })]
    #[case::closed_last_bracket(FeeCalculation::Tiered {
        brackets: vec![FeeBracket { up_to: Some(Money::from_minor(100)), flat: None, rate: None }],
    })]
    #[case::descending(FeeCalculation::Tiered {
        brackets: vec![
            FeeBracket { up_to: Some(Money::from_minor(500)), flat: None, rate: None },
            FeeBracket { up_to: Some(Money::from_minor(100)), flat: None, rate: None },
            FeeBracket { up_to: None, flat: None, rate: None },
        ],
    })]
    #[case::open_bracket_in_middle(FeeCalculation::Tiered {
        brackets: vec![
            FeeBracket { up_to: None, flat: None, rate: None },
            FeeBracket { up_to: None, flat: None, rate: None },
        ],
    })]
    #[case::rate_above_one(FeeCalculation::Percentage { rate: Decimal::new(15, 1), minimum: None, maximum: None })]
    #[case::min_above_max(FeeCalculation::Percentage {
        rate: Decimal::new(1, 2),
        minimum: Some(Money::from_minor(500)),
        maximum: Some(Money::from_minor(100)),
    })]
    #[case::negative_flat(FeeCalculation::Flat { amount: Money::from_minor(-1) })]
    fn test_malformed_policies_rejected(#[case] calculation: FeeCalculation) {
        let policy = FeePolicy {
            name: "broken".to_string(),
            description: "broken".to_string(),
            calculation,
        };
        assert!(FeeSchedule::new(vec![], policy).is_err());
    }

    #[test]
    fn test_inverted_rule_window_rejected() {
        let rule = FeeRule {
            transaction_kind: TransactionKind::Transfer,
            tier: None,
            region: None,
            min_amount: Some(Money::from_minor(500)),
            max_amount: Some(Money::from_minor(500)),
            policy: FeePolicy::free("p", "p"),
        };
        let result = FeeSchedule::new(vec![rule], FeePolicy::free("d", "d"));
        assert!(matches!(result, Err(FeeConfigError::InvalidRule { index: 0, .. })));
    }

    #[test]
    fn test_compute_rejects_uncovered_amount() {
        // Hand-built policy that bypassed schedule validation
        let policy = FeePolicy {
            name: "gap".to_string(),
            description: "gap".to_string(),
            calculation: FeeCalculation::Tiered {
                brackets: vec![FeeBracket {
                    up_to: Some(Money::from_minor(1000)),
                    flat: Some(Money::from_minor(10)),
                    rate: None,
                }],
            },
        };
        assert_eq!(
            compute_fee_amount(&policy, money("5.00")).unwrap(),
            Money::from_minor(10)
        );
        let err = compute_fee_amount(&policy, money("50.00")).unwrap_err();
        assert!(matches!(err, TransferError::FeeCalculation { .. }));
    }

    #[test]
    fn test_percentage_rounds_half_away_from_zero() {
        let policy = FeePolicy {
            name: "pct".to_string(),
            description: "pct".to_string(),
            calculation: FeeCalculation::Percentage {
                rate: Decimal::new(1, 2),
                minimum: None,
                maximum: None,
            },
        };
        // 0.50 * 1% = 0.005 -> 0.01
        assert_eq!(
            compute_fee_amount(&policy, money("0.50")).unwrap(),
            Money::from_minor(1)
        );
        // 0.40 * 1% = 0.004 -> 0.00
        assert_eq!(compute_fee_amount(&policy, money("0.40")).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_yaml_parse_error() {
        let result = FeeSchedule::from_yaml("rules: [");
        assert!(matches!(result, Err(FeeConfigError::Parse(_))));
    }
}
