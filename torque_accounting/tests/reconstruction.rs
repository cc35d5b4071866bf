use std::collections::BTreeMap;

use color_eyre::Result;
use torque_accounting::{
    reconstruct, AggregateError, CoreSeconds, EventCollector, EventFilter, JobStatus, LogTimeZone, NodeCapacity,
    NodeUsage, ReconstructOptions, UserBilling,
};

const ACCOUNTING: &str = "\
04/09/2024 09:00:00;L;license;pbs_server started with 64 licenses
04/09/2024 09:00:01;Q;100.head;queue=batch
04/09/2024 09:00:02;Q;101.head;queue=batch
04/09/2024 09:00:05;S;100.head;user=alice group=phys jobname=mpi queue=batch ctime=1712653201 qtime=1712653201 etime=1712653201 start=1712653205 owner=alice@login exec_host=n01/0-3+n02/0-3 Resource_List.nodes=2:ppn=4 Resource_List.walltime=02:00:00
04/09/2024 09:00:06;S;101.head;user=bob group=chem jobname=serial queue=batch ctime=1712653202 qtime=1712653202 etime=1712653202 start=1712653206 owner=bob@login exec_host=n03/0 Resource_List.walltime=00:10:00
04/09/2024 09:05:00;D;101.head;requestor=bob@login
04/09/2024 09:05:01;E;101.head;user=bob group=chem jobname=serial queue=batch ctime=1712653202 qtime=1712653202 etime=1712653202 start=1712653206 owner=bob@login exec_host=n03/0 end=1712653501 Exit_status=271 resources_used.cput=00:04:50 resources_used.mem=1000kb resources_used.vmem=5000kb resources_used.walltime=00:04:55
04/09/2024 10:00:05;E;100.head;user=alice group=phys jobname=mpi queue=batch ctime=1712653201 qtime=1712653201 etime=1712653201 start=1712653205 owner=alice@login exec_host=n01/0-3+n02/0-3 end=1712656805 Exit_status=0 resources_used.cput=07:00:00 resources_used.mem=2048000kb resources_used.vmem=4096000kb resources_used.walltime=01:00:00
04/09/2024 10:30:00;Q;102.head;queue=long
";

fn options(filter: EventFilter) -> ReconstructOptions {
    ReconstructOptions {
        filter,
        time_zone: LogTimeZone::Utc,
    }
}

fn map<V: Copy>(entries: &[(&str, V)]) -> BTreeMap<String, V> {
    entries.iter().map(|&(k, v)| (k.to_owned(), v)).collect()
}

#[test_log::test]
fn full_log() -> Result<()> {
    let table = reconstruct(ACCOUNTING.lines(), options(EventFilter::All))?;
    assert_eq!(table.len(), 3);
    assert_eq!(table.stats().markers, 1);
    assert_eq!(table.period_seconds(), 5400);

    let mpi = table.get("100.head").expect("job 100 was logged");
    assert_eq!(mpi.status(), JobStatus::Ended);
    assert_eq!(mpi.status_string(), "QSE");
    assert_eq!(mpi.fields().req_cpus, 8);
    assert_eq!(mpi.fields().req_nodes(), 2);
    assert_eq!(mpi.fields().memory_kb, 2_048_000);

    let serial = table.get("101.head").expect("job 101 was logged");
    assert_eq!(serial.status_string(), "QSDE");
    assert_eq!(serial.fields().exit_code, 271);
    assert_eq!(serial.account(), "bob");

    assert_eq!(table.get("102.head").map(|job| job.status()), Some(JobStatus::Queued));

    let usage = NodeUsage::collect(table.jobs())?;
    assert_eq!(
        *usage,
        map(&[
            ("n01", CoreSeconds(14_400)),
            ("n02", CoreSeconds(14_400)),
            ("n03", CoreSeconds(295)),
        ])
    );

    let capacity = NodeCapacity::resolve(None, table.jobs());
    assert_eq!(*capacity, map(&[("n01", 4), ("n02", 4), ("n03", 1)]));

    let users = UserBilling::collect(table.jobs()).rows();
    let names: Vec<_> = users.iter().map(|row| row.user.as_str()).collect();
    assert_eq!(names, ["alice", "bob", ""]);
    assert!((users[0].used_cpu_hours - 7.0).abs() < 1e-9);
    assert!((users[0].requested_hours - 8.0).abs() < 1e-9);
    assert!((users[0].pct_parallel - 87.5).abs() < 1e-9);
    assert_eq!(users[2].pct_parallel, 0.0);

    let rows = table.rows();
    let ids: Vec<_> = rows.iter().map(|row| row.jobid.as_str()).collect();
    assert_eq!(ids, ["101.head", "100.head", "102.head"]);
    Ok(())
}

#[test_log::test]
fn ended_only_matches_the_ended_records() -> Result<()> {
    let table = reconstruct(ACCOUNTING.lines(), options(EventFilter::EndedOnly))?;
    assert_eq!(table.len(), 2);
    assert!(table.get("102.head").is_none());
    assert!(table.jobs().all(|job| job.status_string() == "E"));

    let full = reconstruct(ACCOUNTING.lines(), options(EventFilter::All))?;
    assert_eq!(NodeUsage::collect(table.jobs())?, NodeUsage::collect(full.jobs())?);
    Ok(())
}

#[test_log::test]
fn late_queue_record_is_ordered_before_dispatch() -> Result<()> {
    let started = "user=alice queue=batch exec_host=n01/0+n01/1 start=1704067220";
    let arrival_order = [
        "01/01/2024 00:00:10;Q;7.srv;queue=batch user=alice".to_owned(),
        format!("01/01/2024 00:00:20;S;7.srv;{started}"),
        "01/01/2024 00:00:15;Q;7.srv;queue=express".to_owned(),
    ];
    let time_order = [&arrival_order[0], &arrival_order[2], &arrival_order[1]];

    let interleaved = reconstruct(&arrival_order, options(EventFilter::All))?;
    let ordered = reconstruct(time_order, options(EventFilter::All))?;
    let job = interleaved.get("7.srv").expect("job 7 was logged");
    assert_eq!(Some(job), ordered.get("7.srv"));

    assert_eq!(job.status(), JobStatus::Started);
    assert_eq!(job.status_string(), "QQS");
    assert_eq!(job.fields().queue, "batch");
    assert_eq!(job.fields().req_cpus, 2);

    let without_duplicate = reconstruct(
        [&arrival_order[0], &arrival_order[1]],
        options(EventFilter::All),
    )?;
    assert_eq!(
        Some(job.fields()),
        without_duplicate.get("7.srv").map(|job| job.fields())
    );
    Ok(())
}

#[test_log::test]
fn malformed_line_is_skipped() -> Result<()> {
    let mut collector = EventCollector::new(options(EventFilter::All));
    collector.extend_lines(
        "accounting/20240101",
        [
            "01/01/2024 00:00:00;Q",
            "01/01/2024 00:00:01;Q;8.srv;queue=batch user=dave",
        ],
    );
    let table = collector.finish()?;

    assert_eq!(table.stats().malformed, 1);
    assert_eq!(table.len(), 1);
    let job = table.get("8.srv").expect("job 8 was logged");
    assert_eq!(job.fields().user, "dave");
    assert_eq!(job.status(), JobStatus::Queued);
    Ok(())
}

#[test_log::test]
fn nothing_ended_is_an_empty_result_set() -> Result<()> {
    let table = reconstruct(
        [
            "01/01/2024 00:00:00;Q;9.srv;queue=batch",
            "01/01/2024 00:00:05;S;9.srv;queue=batch exec_host=n01/0",
            "01/01/2024 00:00:09;D;10.srv;requestor=root",
        ],
        options(EventFilter::All),
    )?;
    assert_eq!(NodeUsage::collect(table.jobs()), Err(AggregateError::EmptyResultSet));
    Ok(())
}

#[test_log::test]
fn ended_job_ignores_everything_after() -> Result<()> {
    let table = reconstruct(
        [
            "01/01/2024 00:00:00;S;11.srv;user=erin exec_host=n01/0 queue=batch",
            "01/01/2024 00:01:00;E;11.srv;user=erin exec_host=n01/0 queue=batch resources_used.walltime=60",
            "01/01/2024 00:02:00;R;11.srv;queue=other",
            "01/01/2024 00:03:00;S;11.srv;user=mallory exec_host=n09/0-63",
            "01/01/2024 00:04:00;E;11.srv;user=mallory exec_host=n09/0-63 resources_used.walltime=99999",
        ],
        options(EventFilter::All),
    )?;
    let job = table.get("11.srv").expect("job 11 was logged");
    assert_eq!(job.status_string(), "SERSE");
    assert_eq!(job.fields().user, "erin");
    assert_eq!(job.usage(), Some(&map(&[("n01", CoreSeconds(60))])));
    assert_eq!(table.stats().record_only, 3);
    Ok(())
}
