use std::{fs, hint::black_box, path::Path, time::Duration};

use archlens::{
    config::{Config, PackageSelector, ViewSpec},
    model_builder::build_model,
    view::{diff, filter_view},
};
use criterion::{Criterion, criterion_group, criterion_main};
use tempfile::TempDir;

const PACKAGES: usize = 20;
const SUBPACKAGES: usize = 5;
const FILES: usize = 8;

/// A synthetic project where every module imports a handful of modules from
/// neighbouring packages.
fn generate_project(root: &Path) {
    let write = |relative: String, content: String| {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("generated paths have a parent"))
            .expect("Failed to create package directory");
        fs::write(path, content).expect("Failed to write module");
    };

    write("__init__.py".to_owned(), String::new());
    for package in 0..PACKAGES {
        write(format!("pkg{package}/__init__.py"), String::new());
        for sub in 0..SUBPACKAGES {
            write(format!("pkg{package}/sub{sub}/__init__.py"), String::new());
            for file in 0..FILES {
                let target = (package + file + 1) % PACKAGES;
                let sibling = (sub + 1) % SUBPACKAGES;
                let source = format!(
                    "import os\nfrom bench.pkg{target}.sub{sub} import mod{file}\nfrom ..sub{sibling} import mod{file}\n\ndef run():\n    from bench.pkg{target} import sub{sibling}\n"
                );
                write(format!("pkg{package}/sub{sub}/mod{file}.py"), source);
            }
        }
    }
}

fn config_for(root: &Path) -> Config {
    Config {
        name: "bench".to_owned(),
        root_folder: root.to_path_buf(),
        ..Default::default()
    }
}

fn benchmark_model_building(c: &mut Criterion) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = temp_dir.path().join("bench");
    generate_project(&root);
    let config = config_for(&root);

    let mut group = c.benchmark_group("model_building");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("build_model", |b| {
        b.iter(|| build_model(black_box(&config)).expect("model builds"));
    });

    let model = build_model(&config).expect("model builds");
    let overview = ViewSpec {
        packages: vec![PackageSelector::Anchored {
            path: String::new(),
            depth: 1,
        }],
        ..Default::default()
    };
    let detailed = ViewSpec {
        packages: vec![PackageSelector::Prefix(String::new())],
        ignore_packages: vec!["*sub4*".to_owned()],
        ..Default::default()
    };

    group.bench_function("filter_view_rollup", |b| {
        b.iter(|| filter_view(black_box(&model), black_box(&overview)));
    });
    group.bench_function("filter_view_detailed", |b| {
        b.iter(|| filter_view(black_box(&model), black_box(&detailed)));
    });

    let local = filter_view(&model, &detailed);
    let remote = filter_view(&model, &overview);
    group.bench_function("diff", |b| {
        b.iter(|| diff(black_box(&local), black_box(&remote)));
    });

    group.finish();
}

criterion_group!(benches, benchmark_model_building);
criterion_main!(benches);
