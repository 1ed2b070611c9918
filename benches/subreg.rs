use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use subreg::lowlevel::{iterative_phase, FftKernel, Kernel, ScalarKernel, TemplatePlan};
use subreg::{
    AutoregTemplate, IterativePhase, Metric, MutualInformationMatcher, OwnedImage,
    UpsampledTemplate, WindowMatcher,
};

fn make_image(width: usize, height: usize) -> OwnedImage {
    OwnedImage::from_fn(width, height, |x, y| {
        let (fx, fy) = (x as f32, y as f32);
        (((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF) as f32 * 0.5
            + 40.0 * (0.21 * fx).sin() * (0.17 * fy).cos()
    })
    .unwrap()
}

fn bench_kernels(c: &mut Criterion) {
    let search = make_image(281, 281);
    let template = search.view().roi(95, 90, 98, 98).unwrap().to_owned_image();
    let plan = TemplatePlan::from_view(template.view()).unwrap();

    c.bench_function("zncc_scalar_281_98", |b| {
        b.iter(|| {
            black_box(ScalarKernel::scan(search.view(), &plan, Metric::CcoeffNormed).unwrap())
        });
    });
    c.bench_function("zncc_fft_281_98", |b| {
        b.iter(|| black_box(FftKernel::scan(search.view(), &plan, Metric::CcoeffNormed).unwrap()));
    });
}

fn bench_matchers(c: &mut Criterion) {
    let search = make_image(121, 121);
    let template = search.view().roi(32, 28, 61, 61).unwrap().to_owned_image();

    let autoreg = AutoregTemplate::default();
    c.bench_function("autoreg_121_61", |b| {
        b.iter(|| black_box(autoreg.match_windows(template.view(), search.view())));
    });

    let upsampled = UpsampledTemplate::default();
    c.bench_function("upsampled_x4_121_61", |b| {
        b.iter(|| black_box(upsampled.match_windows(template.view(), search.view())));
    });

    let small_search = make_image(41, 41);
    let small_template = small_search.view().roi(8, 9, 25, 25).unwrap().to_owned_image();
    let mi = MutualInformationMatcher::default();
    c.bench_function("mutual_information_41_25", |b| {
        b.iter(|| black_box(mi.match_windows(small_template.view(), small_search.view())));
    });

    let reference = make_image(200, 200);
    let moving = OwnedImage::from_fn(200, 200, |x, y| {
        reference.get((x + 4).min(199), (y + 197) % 200).unwrap()
    })
    .unwrap();
    let cfg = IterativePhase::default();
    c.bench_function("iterative_phase_51", |b| {
        b.iter(|| {
            black_box(iterative_phase(
                &reference,
                &moving,
                (100.0, 100.0),
                (100.0, 100.0),
                &cfg,
            ))
        });
    });
}

criterion_group!(benches, bench_kernels, bench_matchers);
criterion_main!(benches);
