use criterion::{criterion_group, criterion_main, Criterion};
use kinetix_core::{Color, Point2D};
use kinetix_render::{Canvas, TextStyle};

fn draw_mixed(canvas: &mut Canvas, t: f64) {
    canvas.clear(Color::BLACK);

    canvas.save();
    canvas.translate(960.0, 540.0);
    canvas.rotate(t * 0.001);
    canvas.fill_round_rect(-200.0, -200.0, 400.0, 400.0, 24.0, Color::RED);
    canvas.restore();

    canvas.fill_pie(400.0, 400.0, 150.0, 60.0, 0.0, 4.0, Color::BLUE);

    let points: Vec<Point2D> = (0..12)
        .map(|i| Point2D::new(100.0 + i as f64 * 80.0, 900.0 - (i * i) as f64 * 4.0))
        .collect();
    canvas.stroke_polyline(&points, 4.0, Color::GREEN);

    let style = TextStyle::new("Inter", 100.0, Color::WHITE);
    let _ = canvas.fill_text("Benchmarks", 200.0, 100.0, &style);
}

fn bench_canvas(c: &mut Criterion) {
    let mut group = c.benchmark_group("kinetix_canvas");
    group.sample_size(10);

    group.bench_function("mixed_1080p_30_frames", |b| {
        let mut canvas = Canvas::new(1920, 1080);
        b.iter(|| {
            for i in 0..30 {
                draw_mixed(&mut canvas, i as f64 * 33.3);
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_canvas);
criterion_main!(benches);
