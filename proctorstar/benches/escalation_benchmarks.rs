use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use proctorstar::{
    ProctorConfig, SessionState,
    detection::{FaceDetection, Keypoint, ObjectDetection, Pose},
    posture::PostureAggregator,
    types::Point,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};

// Pose leaning `degrees` off vertical with confident keypoints
fn pose_with_tilt(degrees: f64) -> Pose {
    let radians = degrees.to_radians();
    let hip = Point::new(320.0, 400.0);
    let shoulder = Point::new(hip.x + 180.0 * radians.sin(), hip.y - 180.0 * radians.cos());
    let keypoint = |part: &str, position: Point| Keypoint {
        part: part.to_string(),
        position,
        confidence: 0.95,
    };
    Pose {
        score: 0.9,
        keypoints: vec![
            keypoint("nose", Point::new(shoulder.x, shoulder.y - 50.0)),
            keypoint("leftShoulder", Point::new(shoulder.x - 40.0, shoulder.y)),
            keypoint("rightShoulder", Point::new(shoulder.x + 40.0, shoulder.y)),
            keypoint("leftHip", Point::new(hip.x - 30.0, hip.y)),
            keypoint("rightHip", Point::new(hip.x + 30.0, hip.y)),
        ],
    }
}

fn face_with_yaw(yaw_percent: f64) -> FaceDetection {
    let mut annotations = HashMap::new();
    annotations.insert("leftEyeUpper0".to_string(), vec![Point::new(280.0, 200.0); 4]);
    annotations.insert("rightEyeUpper0".to_string(), vec![Point::new(360.0, 200.0); 4]);
    annotations.insert(
        "noseTip".to_string(),
        vec![Point::new(320.0 - yaw_percent * 0.8, 240.0)],
    );
    FaceDetection {
        annotations,
        mesh: Vec::new(),
    }
}

// Strike limit high enough that benchmarked sessions never terminate
fn unbounded_config() -> ProctorConfig {
    let mut config = ProctorConfig::default();
    config.escalation.max_strikes = u32::MAX;
    config
}

fn bench_posture_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("posture_aggregation");

    for window in [20usize, 100, 1000] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("record_and_average", window), &window, |b, &w| {
            let mut aggregator = PostureAggregator::new(w);
            let mut angle = 0.0;
            b.iter(|| {
                angle = (angle + 1.7) % 45.0;
                aggregator.record_angle(black_box(angle));
                black_box(aggregator.current_average())
            });
        });
    }

    group.finish();
}

fn bench_pose_ticks(c: &mut Criterion) {
    let mut group = c.benchmark_group("pose_ticks");
    let config = unbounded_config();

    for (label, degrees) in [("good", 4.0), ("poor", 25.0), ("severe", 40.0)] {
        let pose = pose_with_tilt(degrees);
        group.bench_function(label, |b| {
            let mut state = SessionState::new(&config);
            let mut now = Instant::now();
            b.iter(|| {
                now += Duration::from_millis(900);
                black_box(state.observe_pose(Some(black_box(&pose)), now))
            });
        });
    }

    group.finish();
}

fn bench_detection_ticks(c: &mut Criterion) {
    let mut group = c.benchmark_group("detection_ticks");
    let config = unbounded_config();
    let faces = vec![face_with_yaw(25.0)];
    let objects = vec![
        ObjectDetection::new("person", 0.98),
        ObjectDetection::new("cell phone", 0.91),
    ];

    group.bench_function("faces_look_away", |b| {
        let mut state = SessionState::new(&config);
        let mut now = Instant::now();
        b.iter(|| {
            now += Duration::from_millis(1600);
            black_box(state.observe_faces(black_box(&faces), now))
        });
    });

    group.bench_function("objects_phone", |b| {
        let mut state = SessionState::new(&config);
        let mut now = Instant::now();
        b.iter(|| {
            now += Duration::from_millis(1600);
            black_box(state.observe_objects(black_box(&objects), now))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_posture_aggregation,
    bench_pose_ticks,
    bench_detection_ticks
);

criterion_main!(benches);
