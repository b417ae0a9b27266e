//! Tax-inclusive amount extraction.
//!
//! Line unit prices already include tax. Net and IVA are reverse-computed
//! by dividing the line gross by (1 + IVA + specific rate) — never by
//! adding tax on top of a net price. Rounding happens only at the line
//! and document boundaries to avoid cumulative drift.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use super::types::{DteDraft, LineAmounts, LineItem, LineTax, Totals};

/// General sales tax (IVA) rate: 19%.
pub const IVA_RATE: Decimal = dec!(0.19);

/// Round to whole pesos, half away from zero.
pub fn round_peso(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Compute the amounts of one line from its tax-inclusive price.
///
/// For taxed lines the specific component is taken as the remainder, so
/// `net + iva + specific == gross` holds exactly per line.
pub fn compute_line_amounts(line: &LineItem) -> LineAmounts {
    let gross = round_peso(line.quantity * line.unit_price);
    match line.tax {
        LineTax::Exempt => LineAmounts {
            gross,
            net: Decimal::ZERO,
            exempt: gross,
            iva: Decimal::ZERO,
            specific: Decimal::ZERO,
        },
        LineTax::Standard => {
            let base = gross / (Decimal::ONE + IVA_RATE);
            let net = round_peso(base);
            LineAmounts {
                gross,
                net,
                exempt: Decimal::ZERO,
                iva: gross - net,
                specific: Decimal::ZERO,
            }
        }
        LineTax::Specific { rate, .. } => {
            let base = gross / (Decimal::ONE + IVA_RATE + rate);
            let net = round_peso(base);
            let iva = round_peso(base * IVA_RATE);
            LineAmounts {
                gross,
                net,
                exempt: Decimal::ZERO,
                iva,
                specific: gross - net - iva,
            }
        }
    }
}

/// Fill in the computed amounts of every line and derive the document
/// totals as sums of the already-rounded line components.
pub fn calculate_totals(draft: &mut DteDraft) {
    let mut net = Decimal::ZERO;
    let mut exempt = Decimal::ZERO;
    let mut iva = Decimal::ZERO;
    let mut specific = Decimal::ZERO;

    for line in &mut draft.lines {
        let amounts = compute_line_amounts(line);
        net += amounts.net;
        exempt += amounts.exempt;
        iva += amounts.iva;
        specific += amounts.specific;
        line.amounts = Some(amounts);
    }

    draft.totals = Some(Totals {
        net,
        exempt,
        iva,
        specific,
        total: net + exempt + iva + specific,
    });
}
