//! Settlement arithmetic for completed tasks.
//!
//! Everything here is pure: the same inputs always produce the same amounts, so a
//! settlement can be recomputed from the metadata stored on its transaction.
//!
//! # Rules
//!
//! - Spare parts are a pass-through cost; the vendor never earns on them.
//! - Travel is paid to the vendor in full and never taxed.
//! - When the bill is GST-inclusive, the service portion `billing - spare` is reduced
//!   to its pre-tax value `gross * 100 / (100 + rate)`, rounded to the nearest paisa.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::Serialize;

use crate::{error::AppError, models::transaction::PaymentMethod};

/// Task billing figures, already resolved to paise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementInput {
    pub billing_paise: i64,
    pub spare_paise: i64,
    pub travelling_paise: i64,
    /// Listed booking price, used when no billing amount was entered.
    pub booking_paise: i64,
    pub payment_method: PaymentMethod,
    pub gst_included: bool,
}

impl SettlementInput {
    /// Reject negative figures, naming the first offending field.
    pub fn validate(&self) -> Result<(), AppError> {
        let fields = [
            ("billing_amount", self.billing_paise),
            ("spare_amount", self.spare_paise),
            ("travelling_amount", self.travelling_paise),
            ("booking_amount", self.booking_paise),
        ];
        match fields.into_iter().find(|(_, paise)| *paise < 0) {
            Some((field, _)) => Err(AppError::Validation(format!(
                "{field} cannot be negative"
            ))),
            None => Ok(()),
        }
    }

    fn effective_billing(&self) -> i64 {
        if self.billing_paise == 0 {
            self.booking_paise
        } else {
            self.billing_paise
        }
    }
}

/// Result of a settlement calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SettlementBreakdown {
    /// Service portion after removing spare parts and GST.
    pub base_paise: i64,
    /// GST carved out of the service portion (zero when not tax-inclusive).
    pub gst_paise: i64,
    /// Travel included in the amount (always zero for cash deductions).
    pub travelling_paise: i64,
    /// Magnitude that is credited (earning) or debited (cash collection).
    pub calculated_paise: i64,
}

/// Amount credited to the vendor for an online-paid task.
///
/// `(billing - spare)`, net of GST when tax-inclusive, plus travel.
pub fn calculate_earning(
    input: &SettlementInput,
    gst_rate_percent: Decimal,
) -> Result<SettlementBreakdown, AppError> {
    if input.payment_method == PaymentMethod::Cash {
        return Err(AppError::Validation(
            "Cash-paid tasks settle through the cash-collection deduction".to_string(),
        ));
    }

    let (base, gst) = service_base(input, gst_rate_percent)?;
    let earning = base
        .checked_add(input.travelling_paise)
        .ok_or_else(out_of_range)?;

    if earning < 0 {
        return Err(AppError::CalculationAnomaly(format!(
            "earning computed as {earning} paise"
        )));
    }

    Ok(SettlementBreakdown {
        base_paise: base,
        gst_paise: gst,
        travelling_paise: input.travelling_paise,
        calculated_paise: earning,
    })
}

/// Platform share to claw back when the vendor collected the bill in cash.
///
/// `(billing - spare)`, net of GST when tax-inclusive. Travel is the vendor's own.
pub fn calculate_cash_collection_deduction(
    input: &SettlementInput,
    gst_rate_percent: Decimal,
) -> Result<SettlementBreakdown, AppError> {
    let (base, gst) = service_base(input, gst_rate_percent)?;

    Ok(SettlementBreakdown {
        base_paise: base,
        gst_paise: gst,
        travelling_paise: 0,
        calculated_paise: base,
    })
}

fn service_base(
    input: &SettlementInput,
    gst_rate_percent: Decimal,
) -> Result<(i64, i64), AppError> {
    input.validate()?;

    let gross = input
        .effective_billing()
        .checked_sub(input.spare_paise)
        .ok_or_else(out_of_range)?;
    if gross < 0 {
        return Err(AppError::CalculationAnomaly(format!(
            "spare parts ({} paise) exceed billing ({} paise)",
            input.spare_paise,
            input.effective_billing()
        )));
    }

    if !input.gst_included {
        return Ok((gross, 0));
    }

    let net = strip_gst(gross, gst_rate_percent)?;
    let gst = gross.checked_sub(net).ok_or_else(out_of_range)?;
    Ok((net, gst))
}

fn out_of_range() -> AppError {
    AppError::Validation("Amount is out of range".to_string())
}

/// Pre-tax value of a GST-inclusive amount.
pub fn strip_gst(gross_paise: i64, gst_rate_percent: Decimal) -> Result<i64, AppError> {
    if gst_rate_percent.is_sign_negative() {
        return Err(AppError::Validation("GST rate cannot be negative".to_string()));
    }

    let divisor = Decimal::ONE_HUNDRED + gst_rate_percent;
    (Decimal::from(gross_paise) * Decimal::ONE_HUNDRED / divisor)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(out_of_range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn input(billing: i64, spare: i64, travel: i64, gst: bool) -> SettlementInput {
        SettlementInput {
            billing_paise: billing * 100,
            spare_paise: spare * 100,
            travelling_paise: travel * 100,
            booking_paise: 0,
            payment_method: PaymentMethod::Online,
            gst_included: gst,
        }
    }

    #[test]
    fn cash_deduction_excludes_spare_parts() {
        let breakdown =
            calculate_cash_collection_deduction(&input(1000, 200, 0, false), dec!(18)).unwrap();
        assert_eq!(breakdown.calculated_paise, 80_000);
        assert_eq!(breakdown.gst_paise, 0);
    }

    #[test]
    fn cash_deduction_ignores_travel() {
        let breakdown =
            calculate_cash_collection_deduction(&input(1000, 200, 150, false), dec!(18)).unwrap();
        assert_eq!(breakdown.calculated_paise, 80_000);
        assert_eq!(breakdown.travelling_paise, 0);
    }

    #[test]
    fn online_earning_adds_travel() {
        let breakdown = calculate_earning(&input(1000, 200, 100, false), dec!(18)).unwrap();
        assert_eq!(breakdown.calculated_paise, 90_000);
        assert_eq!(breakdown.base_paise, 80_000);
    }

    #[test]
    fn gst_inclusive_bill_is_reduced_to_pre_tax_value() {
        let breakdown = calculate_earning(&input(1180, 0, 0, true), dec!(18)).unwrap();
        assert_eq!(breakdown.base_paise, 100_000);
        assert_eq!(breakdown.gst_paise, 18_000);
        assert_eq!(breakdown.calculated_paise, 100_000);

        let cash =
            calculate_cash_collection_deduction(&input(1180, 0, 0, true), dec!(18)).unwrap();
        assert_eq!(cash.calculated_paise, 100_000);
    }

    #[test]
    fn gst_rounds_to_nearest_paisa() {
        // 1000.00 / 1.18 = 847.4576…
        assert_eq!(strip_gst(100_000, dec!(18)).unwrap(), 84_746);
        assert_eq!(strip_gst(0, dec!(18)).unwrap(), 0);
        assert_eq!(strip_gst(5_000, dec!(0)).unwrap(), 5_000);
    }

    #[test]
    fn same_inputs_same_outputs() {
        let a = calculate_earning(&input(1234, 56, 78, true), dec!(18)).unwrap();
        let b = calculate_earning(&input(1234, 56, 78, true), dec!(18)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn booking_amount_backs_up_missing_billing() {
        let mut task = input(0, 100, 0, false);
        task.booking_paise = 60_000;
        let breakdown = calculate_cash_collection_deduction(&task, dec!(18)).unwrap();
        assert_eq!(breakdown.calculated_paise, 50_000);
    }

    #[test]
    fn spare_above_billing_is_an_anomaly() {
        let err = calculate_earning(&input(100, 200, 0, false), dec!(18)).unwrap_err();
        assert!(matches!(err, AppError::CalculationAnomaly(_)));
    }

    #[test]
    fn negative_figures_are_rejected_by_name() {
        let cases = [
            (input(1000, -50, 0, false), "spare_amount"),
            (input(-1000, 0, 0, false), "billing_amount"),
            (input(100, 0, -500, false), "travelling_amount"),
        ];
        for (task, field) in cases {
            let err = calculate_earning(&task, dec!(18)).unwrap_err();
            let expected = format!("{field} cannot be negative");
            assert!(
                matches!(&err, AppError::Validation(msg) if *msg == expected),
                "{field}: {err:?}"
            );
        }

        let mut task = input(0, 0, 0, false);
        task.booking_paise = -1;
        assert!(matches!(
            calculate_cash_collection_deduction(&task, dec!(18)),
            Err(AppError::Validation(msg)) if msg.contains("booking_amount")
        ));
    }

    #[test]
    fn negative_spare_cannot_inflate_cash_deduction() {
        let mut task = input(1000, 0, 0, false);
        task.spare_paise = -500_000;
        assert!(calculate_cash_collection_deduction(&task, dec!(18)).is_err());
    }

    #[test]
    fn extreme_amounts_fail_instead_of_overflowing() {
        let task = SettlementInput {
            billing_paise: 90_000_000_000_000_000,
            spare_paise: 0,
            travelling_paise: i64::MAX,
            booking_paise: 0,
            payment_method: PaymentMethod::Online,
            gst_included: false,
        };
        let err = calculate_earning(&task, dec!(18)).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == "Amount is out of range"));

        let gst_task = SettlementInput {
            travelling_paise: 0,
            gst_included: true,
            billing_paise: i64::MAX,
            ..task
        };
        assert!(calculate_cash_collection_deduction(&gst_task, dec!(18)).is_ok());
    }

    #[test]
    fn cash_payments_are_rejected_by_earning_path() {
        let mut task = input(1000, 0, 0, false);
        task.payment_method = PaymentMethod::Cash;
        assert!(matches!(
            calculate_earning(&task, dec!(18)),
            Err(AppError::Validation(_))
        ));
    }
}
