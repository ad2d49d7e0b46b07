use std::fmt::Write;
use std::time::Duration;

use criterion::measurement::WallTime;
use criterion::{
    black_box, criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion,
};
use quick_edn::{parse, parse_with_storage, to_json_string, ArenaStorage, ParseOptions};

/// Record-shaped data, with the equivalent JSON for comparison.
fn make_records(count: usize) -> (String, String) {
    let mut edn = String::from("[");
    let mut json = String::from("[");
    for idx in 0..count {
        if idx > 0 {
            edn.push(' ');
            json.push(',');
        }
        let _ = write!(
            edn,
            r#"{{:id {idx} :user/name "user-{idx}" :score {score} :active {active} :tags #{{:a :b{tag}}}}}"#,
            score = idx as f64 * 0.75,
            active = idx % 2 == 0,
            tag = idx % 7,
        );
        let _ = write!(
            json,
            r#"{{"id":{idx},"user/name":"user-{idx}","score":{score},"active":{active},"tags":["a","b{tag}"]}}"#,
            score = idx as f64 * 0.75,
            active = idx % 2 == 0,
            tag = idx % 7,
        );
    }
    edn.push(']');
    json.push(']');
    (edn, json)
}

fn make_tree(depth: usize, width: usize) -> String {
    if depth == 0 {
        return format!("{{:leaf {width}}}");
    }
    let children: Vec<String> = (0..width).map(|_| make_tree(depth - 1, width)).collect();
    format!("{{:depth {depth} :children [{}]}}", children.join(" "))
}

fn make_strings(count: usize, escaped: bool) -> String {
    let body = if escaped {
        r#"line one\nline \"two\"\tand a tab"#
    } else {
        "a plain string with no escapes at all"
    };
    let items: Vec<String> = (0..count).map(|idx| format!("\"{body} {idx}\"")).collect();
    format!("[{}]", items.join(" "))
}

fn make_numbers(count: usize) -> String {
    let items: Vec<String> = (0..count)
        .map(|idx| match idx % 5 {
            0 => format!("{}", idx as i64 * 7919),
            1 => format!("{}.{}", idx, idx % 100),
            2 => format!("{}e-3", idx),
            3 => format!("9223372036854775{idx:03}999N"),
            _ => format!("{idx}.25M"),
        })
        .collect();
    format!("[{}]", items.join(" "))
}

fn bench_parse(group: &mut BenchmarkGroup<'_, WallTime>, name: &str, edn: &str) {
    group.throughput(criterion::Throughput::Bytes(edn.len() as u64));
    group.bench_function(BenchmarkId::new("edn", name), |b| {
        b.iter(|| {
            let doc = parse(black_box(edn.as_bytes())).unwrap();
            black_box(doc.root_id());
        });
    });
}

fn bench_against_json(group: &mut BenchmarkGroup<'_, WallTime>, name: &str, edn: &str, json: &str) {
    bench_parse(group, name, edn);

    group.throughput(criterion::Throughput::Bytes(json.len() as u64));
    group.bench_function(BenchmarkId::new("json", name), |b| {
        b.iter(|| {
            let value: serde_json::Value = serde_json::from_str(black_box(json)).unwrap();
            black_box(value);
        });
    });
}

fn bench_reuse(group: &mut BenchmarkGroup<'_, WallTime>, name: &str, edn: &str) {
    let options = ParseOptions::default();
    group.throughput(criterion::Throughput::Bytes(edn.len() as u64));
    group.bench_function(BenchmarkId::new("edn-reuse", name), |b| {
        let mut storage = Some(ArenaStorage::new());
        b.iter(|| {
            let recycled = storage.take().unwrap_or_default();
            let doc = parse_with_storage(black_box(edn.as_bytes()), &options, recycled).unwrap();
            black_box(doc.root_id());
            storage = Some(doc.into_storage());
        });
    });
}

fn bench_string_access(group: &mut BenchmarkGroup<'_, WallTime>, name: &str, edn: &str) {
    group.bench_function(BenchmarkId::new("edn-decode-all", name), |b| {
        b.iter(|| {
            let doc = parse(black_box(edn.as_bytes())).unwrap();
            let total: usize = doc
                .root()
                .iter()
                .filter_map(|item| item.as_str().map(str::len))
                .sum();
            black_box(total);
        });
    });
}

fn quick_run(inputs: &[&str]) {
    for input in inputs {
        let doc = parse(black_box(input.as_bytes())).unwrap();
        black_box(to_json_string(doc.root()).unwrap());
    }
}

fn criterion_config() -> Criterion {
    if std::env::var("EDN_BENCH_MINIMAL").is_ok() {
        Criterion::default()
            .warm_up_time(Duration::from_secs(0))
            .measurement_time(Duration::from_millis(10))
            .sample_size(1)
            .nresamples(1)
    } else {
        Criterion::default()
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    let (records_edn, records_json) = make_records(2000);
    let tree = make_tree(6, 4);
    let plain = make_strings(5000, false);
    let escaped = make_strings(5000, true);
    let numbers = make_numbers(10000);

    if std::env::var("EDN_BENCH_QUICK").is_ok() {
        quick_run(&[&records_edn, &tree, &plain, &escaped, &numbers]);
        return;
    }

    let mut group = c.benchmark_group("parse");
    bench_against_json(&mut group, "records", &records_edn, &records_json);
    bench_parse(&mut group, "tree", &tree);
    bench_parse(&mut group, "numbers", &numbers);
    bench_parse(&mut group, "strings-plain", &plain);
    bench_parse(&mut group, "strings-escaped", &escaped);
    group.finish();

    let mut group = c.benchmark_group("reuse");
    bench_reuse(&mut group, "records", &records_edn);
    bench_reuse(&mut group, "tree", &tree);
    group.finish();

    let mut group = c.benchmark_group("strings");
    bench_string_access(&mut group, "plain", &plain);
    bench_string_access(&mut group, "escaped", &escaped);
    group.finish();
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = criterion_benchmark
}
criterion_main!(benches);
