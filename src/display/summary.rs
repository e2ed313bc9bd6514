use crate::result::CompensationReport;
use crate::store::PointRole;
use std::fmt::Write;

/// Plain-text digest of a compensation run.
pub fn format_summary(report: &CompensationReport) -> String {
    let mut out = String::new();
    let closure = &report.closure;
    let result = &report.result;

    let _ = writeln!(out, "LEVELING COMPENSATION ({} line, {:.3} km)", closure.kind.label(), closure.total_length_km);
    let _ = writeln!(out, "--------------------------------------------------");
    match closure.reference_altitude {
        Some(reference) => {
            let _ = writeln!(
                out,
                "Closure: {:+.3} mm against {:.4} m (tolerance {:.3} mm, {})",
                closure.closure_error_mm,
                reference,
                closure.tolerance_mm,
                if closure.passes { "ok" } else { "EXCEEDED" }
            );
        }
        None => {
            let _ = writeln!(out, "Closure: none (final altitude {:.4} m)", closure.computed_final_altitude);
        }
    }
    let _ = writeln!(
        out,
        "Solver: {:?}, {} unknowns, r = {}",
        result.method,
        result.unknowns.len(),
        result.degrees_of_freedom
    );
    let _ = writeln!(
        out,
        "σ₀ = {:.4}  χ² {:.3} / {:.3} ({})",
        result.sigma0,
        result.unit_weight_test.statistic,
        result.unit_weight_test.critical_value,
        if result.unit_weight_test.passes { "ok" } else { "FAILED" }
    );

    let _ = writeln!(out);
    let _ = writeln!(out, "{:<12} {:>14} {:>10} {:>14} {:>8}", "Point", "Provisional", "dx [mm]", "Adjusted", "σ [mm]");
    for p in &result.points {
        let fixed = p.role == PointRole::Fixed;
        let _ = writeln!(
            out,
            "{:<12} {:>14.4} {:>10} {:>14.4} {:>8}",
            if fixed { format!("{} *", p.id) } else { p.id.to_string() },
            p.provisional_altitude,
            p.correction_mm.map_or_else(|| "-".to_string(), |x| format!("{:+.3}", x)),
            p.adjusted_altitude,
            p.std_dev_mm.map_or_else(|| "-".to_string(), |s| format!("{:.3}", s)),
        );
    }

    if !result.blunders.is_empty() {
        let _ = writeln!(out);
        for b in &result.blunders {
            let _ = writeln!(
                out,
                "Suspect: {} -> {} |r̂| = {:.3} ({:.2}x critical)",
                b.origin.from,
                b.origin.to,
                b.normalized_residual.abs(),
                b.significance
            );
        }
    }

    let c = &result.certification;
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Certification at {:.2} mm: {}",
        c.target_mm,
        if c.certified { "PASSED" } else { "NOT CERTIFIED" }
    );
    out
}
