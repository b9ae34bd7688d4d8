//! Benchmarks for calibration-curve evaluation and value formatting.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use specfit_rs::curve::{CalibrationModel, CurveFunction, LogPolynomialEfficiency};
use specfit_rs::ErrValue;

fn fitted_model(degree: usize) -> CalibrationModel<LogPolynomialEfficiency> {
    let curve = LogPolynomialEfficiency::new(degree);
    let mut truth = vec![0.0; degree + 1];
    truth[0] = 2.0;
    truth[1] = -0.8;

    let x: Vec<f64> = (1..=20).map(|i| 50.0 * i as f64).collect();
    let y: Vec<f64> = x.iter().map(|&e| curve.eval(e, &truth)).collect();
    let sigma: Vec<f64> = y.iter().map(|v| 0.02 * v).collect();

    let mut model = CalibrationModel::new(curve);
    model
        .fit(&x, &y, None, Some(sigma.as_slice()))
        .expect("fit");
    model
}

fn bench_format(c: &mut Criterion) {
    let mut group = c.benchmark_group("errvalue_format");
    let values = [
        ("compact", ErrValue::new(0.1234, 0.0056)),
        ("scientific", ErrValue::new(1.0e7, 3.0e6)),
        ("no_error", ErrValue::exact(12.0)),
    ];

    for (name, value) in values {
        group.bench_function(name, |b| b.iter(|| black_box(value).format()));
    }
    group.bench_function("parse", |b| b.iter(|| ErrValue::parse(black_box("1.230(40)e-3"))));

    group.finish();
}

fn bench_error(c: &mut Criterion) {
    let mut group = c.benchmark_group("curve_error");

    for degree in [1, 3, 5] {
        let model = fitted_model(degree);
        group.bench_with_input(BenchmarkId::new("analytic", degree), &model, |b, model| {
            b.iter(|| model.error(black_box(661.7)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_format, bench_error);
criterion_main!(benches);
