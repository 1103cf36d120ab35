use chrono::{DateTime, TimeZone, Utc};
use reservation_billing::*;

fn at(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, month, day, hour, 0, 0).unwrap()
}

fn project(id: &str) -> Project {
    Project {
        id: id.to_string(),
        title: format!("Project {id}"),
        owner: "pi@example.org".to_string(),
    }
}

fn reservation(id: &str, project_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Reservation {
    Reservation {
        id: id.to_string(),
        project_id: project_id.to_string(),
        node: "gpu-01".to_string(),
        start,
        end,
        status: ReservationStatus::Approved,
    }
}

fn window(title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> MaintenanceWindow {
    MaintenanceWindow {
        title: title.to_string(),
        description: "scheduled downtime".to_string(),
        start,
        end,
    }
}

fn snapshot(
    id: &str,
    project_id: &str,
    created_at: DateTime<Utc>,
    shares: &[(&str, f64)],
) -> CostAllocationSnapshot {
    CostAllocationSnapshot {
        id: id.to_string(),
        project_id: project_id.to_string(),
        created_at,
        cost_objects: shares
            .iter()
            .map(|(co, pct)| CostObjectShare {
                cost_object_id: co.to_string(),
                percentage: *pct,
            })
            .collect(),
    }
}

fn generate(dataset: &BillingDataset, year: i32, month: u32) -> Report {
    let period = InvoicePeriod::new(year, month).unwrap();
    let options = GenerateOptions::new("integration-test", at(3, 1, 12));
    BillingEngine::generate_monthly_report(dataset, &period, &options).unwrap()
}

#[test]
fn test_single_maintenance_window_deduction() {
    // 41h raw reservation, 12h window fully inside it.
    let dataset = BillingDataset::new()
        .with_project(project("p-1"))
        .with_reservation(reservation("r-1", "p-1", at(2, 14, 16), at(2, 16, 9)))
        .with_maintenance_window(window("patching", at(2, 15, 8), at(2, 15, 20)))
        .with_snapshot(snapshot("s-1", "p-1", at(1, 1, 0), &[("CO-A", 100.0)]));

    let report = generate(&dataset, 2023, 2);
    let line = &report.project("p-1").unwrap().lines[0];

    assert_eq!(line.raw_hours, 41.0);
    assert_eq!(line.maintenance_deduction, 12.0);
    assert_eq!(line.billable_hours, 29.0);
    assert_eq!(report.project("p-1").unwrap().total_hours, 29.0);
    assert_eq!(report.project("p-1").unwrap().cost_totals["CO-A"], 29.0);
}

#[test]
fn test_two_overnight_windows_deduction() {
    let dataset = BillingDataset::new()
        .with_project(project("p-1"))
        .with_reservation(reservation("r-1", "p-1", at(2, 14, 16), at(2, 16, 9)))
        .with_maintenance_window(window("night-1", at(2, 14, 20), at(2, 15, 8)))
        .with_maintenance_window(window("night-2", at(2, 15, 20), at(2, 16, 8)))
        .with_snapshot(snapshot("s-1", "p-1", at(1, 1, 0), &[("CO-A", 100.0)]));

    let report = generate(&dataset, 2023, 2);
    let line = &report.project("p-1").unwrap().lines[0];

    assert_eq!(line.maintenance_deduction, 24.0);
    assert_eq!(line.billable_hours, 17.0);
}

#[test]
fn test_reservation_wholly_inside_window_bills_zero() {
    let dataset = BillingDataset::new()
        .with_project(project("p-1"))
        .with_reservation(reservation("r-1", "p-1", at(2, 15, 6), at(2, 15, 18)))
        .with_maintenance_window(window("all-day", at(2, 15, 0), at(2, 16, 0)))
        .with_snapshot(snapshot("s-1", "p-1", at(1, 1, 0), &[("CO-A", 100.0)]));

    let report = generate(&dataset, 2023, 2);
    let line = &report.project("p-1").unwrap().lines[0];

    assert_eq!(line.raw_hours, 12.0);
    assert_eq!(line.billable_hours, 0.0);
    assert_eq!(report.project("p-1").unwrap().total_hours, 0.0);
}

#[test]
fn test_mid_reservation_allocation_change_attributes_per_day() {
    // 100% CO-A before Feb 15, 50/50 from Feb 15 onwards.
    let dataset = BillingDataset::new()
        .with_project(project("p-1"))
        .with_reservation(reservation("r-1", "p-1", at(2, 14, 0), at(2, 16, 9)))
        .with_snapshot(snapshot("s-a", "p-1", at(1, 1, 0), &[("CO-A", 100.0)]))
        .with_snapshot(snapshot(
            "s-b",
            "p-1",
            at(2, 15, 0),
            &[("CO-A", 50.0), ("CO-B", 50.0)],
        ));

    let report = generate(&dataset, 2023, 2);
    let invoice = report.project("p-1").unwrap();
    let line = &invoice.lines[0];

    // Feb 14: 24h -> CO-A; Feb 15: 12h/12h; Feb 16 partial: 4.5h/4.5h.
    assert_eq!(invoice.cost_totals["CO-A"], 40.5);
    assert_eq!(invoice.cost_totals["CO-B"], 16.5);
    assert_eq!(invoice.total_hours, 57.0);

    assert_eq!(line.days[0].snapshot_id.as_deref(), Some("s-a"));
    assert_eq!(line.days[1].snapshot_id.as_deref(), Some("s-b"));
    assert_eq!(line.days[2].snapshot_id.as_deref(), Some("s-b"));
}

#[test]
fn test_hours_override_replaces_total_with_audit_diff() {
    // Feb 10 00:00 - Feb 13 17:00 computes to 89h.
    let dataset = BillingDataset::new()
        .with_project(project("p-1"))
        .with_reservation(reservation("r-1", "p-1", at(2, 10, 0), at(2, 13, 17)))
        .with_snapshot(snapshot("s-1", "p-1", at(1, 1, 0), &[("CO-A", 100.0)]))
        .with_override(InvoiceLineOverride {
            reservation_id: "r-1".to_string(),
            year: 2023,
            month: 2,
            kind: OverrideKind::Hours { hours: 65.0 },
            author: "manager".to_string(),
            created_at: at(3, 1, 10),
            notes: "credit for failed node".to_string(),
        });

    let report = generate(&dataset, 2023, 2);
    let invoice = report.project("p-1").unwrap();
    let line = &invoice.lines[0];

    assert_eq!(line.billable_hours, 65.0);
    assert_eq!(invoice.total_hours, 65.0);
    assert_eq!(invoice.cost_totals["CO-A"], 65.0);

    let audit = line.applied_override.as_ref().unwrap();
    assert_eq!(audit.author, "manager");
    assert_eq!(
        audit.change,
        OverrideChange::Hours {
            original_hours: 89.0,
            override_hours: 65.0,
        }
    );
}

#[test]
fn test_month_boundary_splits_without_loss() {
    // Jan 30 16:00 - Feb 2 09:00: 65h total across the two reports.
    let dataset = BillingDataset::new()
        .with_project(project("p-1"))
        .with_reservation(reservation("r-1", "p-1", at(1, 30, 16), at(2, 2, 9)))
        .with_snapshot(snapshot("s-1", "p-1", at(1, 1, 0), &[("CO-A", 100.0)]));

    let january = generate(&dataset, 2023, 1);
    let february = generate(&dataset, 2023, 2);

    let jan_hours = january.project("p-1").unwrap().total_hours;
    let feb_hours = february.project("p-1").unwrap().total_hours;
    assert_eq!(jan_hours, 32.0);
    assert_eq!(feb_hours, 33.0);

    let full_span = Interval::new(at(1, 30, 16), at(2, 2, 9));
    assert_eq!(jan_hours + feb_hours, full_span.hours());
}

#[test]
fn test_day_audits_sum_to_line_total() -> anyhow::Result<()> {
    let dataset = BillingDataset::new()
        .with_project(project("p-1"))
        .with_reservation(reservation("r-1", "p-1", at(2, 3, 7), at(2, 19, 13)))
        .with_maintenance_window(window("midmonth", at(2, 10, 2), at(2, 11, 20)))
        .with_snapshot(snapshot("s-1", "p-1", at(1, 1, 0), &[("CO-A", 100.0)]));

    let report = generate(&dataset, 2023, 2);
    let line = &report.project("p-1").unwrap().lines[0];

    let day_sum: f64 = line.days.iter().map(|d| d.billable_hours).sum();
    anyhow::ensure!((day_sum - line.billable_hours).abs() < 1e-9);

    for day in &line.days {
        anyhow::ensure!(day.billable_hours >= 0.0 && day.billable_hours <= 24.0);
        anyhow::ensure!(day.maintenance_hours <= day.raw_hours);
    }
    Ok(())
}

#[test]
fn test_cost_split_conservation_with_uneven_percentages() {
    let dataset = BillingDataset::new()
        .with_project(project("p-1"))
        .with_reservation(reservation("r-1", "p-1", at(2, 1, 5), at(2, 8, 11)))
        .with_snapshot(snapshot(
            "s-1",
            "p-1",
            at(1, 1, 0),
            &[("CO-A", 33.33), ("CO-B", 33.33), ("CO-C", 33.34)],
        ));

    let report = generate(&dataset, 2023, 2);
    let invoice = report.project("p-1").unwrap();

    let allocated: f64 = invoice.cost_totals.values().sum();
    assert!((allocated - invoice.total_hours).abs() <= 0.01 + 1e-9);
}

#[test]
fn test_excluded_line_contributes_nothing_but_stays_visible() {
    let dataset = BillingDataset::new()
        .with_project(project("p-1"))
        .with_reservation(reservation("r-keep", "p-1", at(2, 5, 0), at(2, 6, 0)))
        .with_reservation(reservation("r-drop", "p-1", at(2, 7, 0), at(2, 8, 0)))
        .with_snapshot(snapshot("s-1", "p-1", at(1, 1, 0), &[("CO-A", 100.0)]))
        .with_override(InvoiceLineOverride {
            reservation_id: "r-drop".to_string(),
            year: 2023,
            month: 2,
            kind: OverrideKind::Exclude,
            author: "manager".to_string(),
            created_at: at(3, 1, 10),
            notes: "disputed by project".to_string(),
        });

    let report = generate(&dataset, 2023, 2);
    let invoice = report.project("p-1").unwrap();

    assert_eq!(report.total_reservations, 2);
    assert_eq!(report.excluded_count, 1);
    assert_eq!(invoice.total_hours, 24.0);
    assert_eq!(invoice.cost_totals["CO-A"], 24.0);

    let excluded: Vec<_> = report.excluded_lines().collect();
    assert_eq!(excluded.len(), 1);
    assert_eq!(excluded[0].reservation_id, "r-drop");
    assert_eq!(excluded[0].billable_hours, 0.0);
    assert!(excluded[0].cost_breakdown.is_empty());
}

#[test]
fn test_cost_split_override_replaces_breakdown() {
    let dataset = BillingDataset::new()
        .with_project(project("p-1"))
        .with_reservation(reservation("r-1", "p-1", at(2, 5, 0), at(2, 7, 0)))
        .with_snapshot(snapshot("s-1", "p-1", at(1, 1, 0), &[("CO-A", 100.0)]))
        .with_override(InvoiceLineOverride {
            reservation_id: "r-1".to_string(),
            year: 2023,
            month: 2,
            kind: OverrideKind::CostSplit {
                breakdown: vec![
                    CostObjectHours {
                        cost_object_id: "CO-A".to_string(),
                        hours: 30.0,
                    },
                    CostObjectHours {
                        cost_object_id: "CO-B".to_string(),
                        hours: 18.0,
                    },
                ],
            },
            author: "manager".to_string(),
            created_at: at(3, 1, 10),
            notes: "retroactive grant split".to_string(),
        });

    let report = generate(&dataset, 2023, 2);
    let invoice = report.project("p-1").unwrap();

    assert_eq!(invoice.lines[0].billable_hours, 48.0);
    assert_eq!(invoice.cost_totals["CO-A"], 30.0);
    assert_eq!(invoice.cost_totals["CO-B"], 18.0);
    assert!(report.errors.is_empty());
}

#[test]
fn test_inconsistent_cost_split_override_surfaces_and_keeps_computed_line() {
    let dataset = BillingDataset::new()
        .with_project(project("p-1"))
        .with_reservation(reservation("r-1", "p-1", at(2, 5, 0), at(2, 7, 0)))
        .with_snapshot(snapshot("s-1", "p-1", at(1, 1, 0), &[("CO-A", 100.0)]))
        .with_override(InvoiceLineOverride {
            reservation_id: "r-1".to_string(),
            year: 2023,
            month: 2,
            kind: OverrideKind::CostSplit {
                breakdown: vec![CostObjectHours {
                    cost_object_id: "CO-B".to_string(),
                    hours: 10.0,
                }],
            },
            author: "manager".to_string(),
            created_at: at(3, 1, 10),
            notes: "typo".to_string(),
        });

    let report = generate(&dataset, 2023, 2);
    let invoice = report.project("p-1").unwrap();

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].reservation_id, "r-1");

    // The computed line stands, un-overridden.
    let line = &invoice.lines[0];
    assert_eq!(line.billable_hours, 48.0);
    assert_eq!(line.cost_breakdown[0].cost_object_id, "CO-A");
    assert!(line.applied_override.is_none());
}

#[test]
fn test_allocation_gap_surfaces_unallocated_hours() {
    // Snapshot appears mid-reservation; earlier days have no allocation.
    let dataset = BillingDataset::new()
        .with_project(project("p-1"))
        .with_reservation(reservation("r-1", "p-1", at(2, 14, 0), at(2, 16, 0)))
        .with_snapshot(snapshot("s-1", "p-1", at(2, 15, 0), &[("CO-A", 100.0)]));

    let report = generate(&dataset, 2023, 2);
    let invoice = report.project("p-1").unwrap();

    assert_eq!(invoice.cost_totals[UNALLOCATED], 24.0);
    assert_eq!(invoice.cost_totals["CO-A"], 24.0);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].reservation_id, "r-1");
    assert!(report.warnings[0].message.contains(UNALLOCATED));
}

#[test]
fn test_newer_override_supersedes_older() {
    let base = InvoiceLineOverride {
        reservation_id: "r-1".to_string(),
        year: 2023,
        month: 2,
        kind: OverrideKind::Hours { hours: 10.0 },
        author: "first".to_string(),
        created_at: at(3, 1, 10),
        notes: String::new(),
    };
    let newer = InvoiceLineOverride {
        kind: OverrideKind::Hours { hours: 20.0 },
        author: "second".to_string(),
        created_at: at(3, 2, 10),
        ..base.clone()
    };

    let dataset = BillingDataset::new()
        .with_project(project("p-1"))
        .with_reservation(reservation("r-1", "p-1", at(2, 5, 0), at(2, 7, 0)))
        .with_snapshot(snapshot("s-1", "p-1", at(1, 1, 0), &[("CO-A", 100.0)]))
        .with_override(base)
        .with_override(newer);

    let report = generate(&dataset, 2023, 2);
    let line = &report.project("p-1").unwrap().lines[0];

    assert_eq!(line.billable_hours, 20.0);
    assert_eq!(line.applied_override.as_ref().unwrap().author, "second");
}

#[test]
fn test_multiple_projects_grouped_deterministically() {
    let dataset = BillingDataset::new()
        .with_project(project("p-alpha"))
        .with_project(project("p-beta"))
        .with_reservation(reservation("r-2", "p-beta", at(2, 5, 0), at(2, 6, 0)))
        .with_reservation(reservation("r-1", "p-alpha", at(2, 5, 0), at(2, 6, 0)))
        .with_snapshot(snapshot("s-a", "p-alpha", at(1, 1, 0), &[("CO-A", 100.0)]))
        .with_snapshot(snapshot("s-b", "p-beta", at(1, 1, 0), &[("CO-B", 100.0)]));

    let first = generate(&dataset, 2023, 2);
    let second = generate(&dataset, 2023, 2);

    let ids: Vec<&str> = first.projects.iter().map(|p| p.project_id.as_str()).collect();
    assert_eq!(ids, vec!["p-alpha", "p-beta"]);
    assert_eq!(first, second);
}

#[test]
fn test_finalized_period_still_recomputes() {
    let dataset = BillingDataset::new()
        .with_project(project("p-1"))
        .with_reservation(reservation("r-1", "p-1", at(2, 5, 0), at(2, 6, 0)))
        .with_snapshot(snapshot("s-1", "p-1", at(1, 1, 0), &[("CO-A", 100.0)]));

    let mut period = InvoicePeriod::new(2023, 2).unwrap();
    period.finalize().unwrap();

    let options = GenerateOptions::new("integration-test", at(3, 1, 12));
    let report = BillingEngine::generate_monthly_report(&dataset, &period, &options).unwrap();

    assert_eq!(report.finalize_state, PeriodState::Finalized);
    assert_eq!(report.project("p-1").unwrap().total_hours, 24.0);
}

#[test]
fn test_report_metadata_fields() {
    let dataset = BillingDataset::new()
        .with_project(project("p-1"))
        .with_reservation(reservation("r-1", "p-1", at(2, 5, 0), at(2, 6, 0)))
        .with_snapshot(snapshot("s-1", "p-1", at(1, 1, 0), &[("CO-A", 100.0)]));

    let report = generate(&dataset, 2023, 2);

    assert_eq!(report.year, 2023);
    assert_eq!(report.month, 2);
    assert_eq!(report.generated_by, "integration-test");
    assert_eq!(report.generated_at, at(3, 1, 12));
    assert_eq!(report.finalize_state, PeriodState::Draft);
}

#[test]
fn test_ingested_export_end_to_end() -> anyhow::Result<()> {
    let export: RawBillingExport = serde_json::from_str(
        r#"{
            "projects": [{"id": "p-1", "title": "Climate Sim", "owner": "pi@example.org"}],
            "reservations": [{
                "id": "r-1",
                "project_id": "p-1",
                "node": "gpu-01",
                "start": "2023-02-14T16:00:00",
                "end": "2023-02-16T09:00:00",
                "status": "Approved"
            }],
            "maintenance_windows": [{
                "title": "patching",
                "start": "2023-02-15T09:00:00+01:00",
                "end": "2023-02-15T21:00:00+01:00"
            }],
            "snapshots": [{
                "id": "s-1",
                "project_id": "p-1",
                "created_at": "2023-01-01T00:00:00",
                "cost_objects": [{"cost_object_id": "CO-A", "percentage": 100.0}]
            }]
        }"#,
    )?;

    let dataset = build_dataset(export);
    let report = generate(&dataset, 2023, 2);
    let line = &report.project("p-1").unwrap().lines[0];

    // The zoned window normalizes to 08:00-20:00 UTC.
    assert_eq!(line.maintenance_deduction, 12.0);
    assert_eq!(line.billable_hours, 29.0);
    Ok(())
}
