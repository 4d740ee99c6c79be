use std::fs::File;
use std::os::unix::io::{AsFd, BorrowedFd};

use criterion::{criterion_group, criterion_main, Criterion};
use drm::control::{from_u32, PlaneType};
use indexmap::IndexMap;
use rand::Rng;
use scanout::backend::allocator::{
    layout::{plane_layout, ChromaAlignment},
    Fourcc, GrallocHandle, PixelFormat, Usage,
};
use scanout::backend::drm::{Layer, PlaneInfo, PlanePool, PlaneProvisioner, PlatformConfig};
use tracing_subscriber::EnvFilter;

struct BenchBuffer<'a> {
    fd: &'a File,
    format: PixelFormat,
}

impl GrallocHandle for BenchBuffer<'_> {
    fn width(&self) -> u32 {
        1920
    }
    fn height(&self) -> u32 {
        1080
    }
    fn format(&self) -> PixelFormat {
        self.format
    }
    fn stride(&self) -> u32 {
        7680
    }
    fn usage(&self) -> Usage {
        Usage::HW_FB | Usage::HW_COMPOSER
    }
    fn fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

const FORMATS: [PixelFormat; 4] = [
    PixelFormat::RGBA_8888,
    PixelFormat::RGB_565,
    PixelFormat::YV12,
    PixelFormat::YCRCB_420_SP,
];
const FOURCCS: [Fourcc; 4] = [Fourcc::Abgr8888, Fourcc::Bgr565, Fourcc::Yvu420, Fourcc::Nv12];

fn criterion_benchmark(c: &mut Criterion) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let null = File::open("/dev/null").expect("failed to open /dev/null");
    let mut rand = rand::thread_rng();

    let planes = (0..8u32)
        .map(|i| {
            let type_ = if i == 0 {
                PlaneType::Primary
            } else {
                PlaneType::Overlay
            };
            let formats = FOURCCS
                .iter()
                .copied()
                .filter(|_| rand.gen_bool(0.5))
                .collect::<Vec<_>>();
            PlaneInfo::new(from_u32(100 + i).unwrap(), type_, formats)
        })
        .collect::<PlanePool>();
    let layers = (0..64usize)
        .map(|i| {
            let format = FORMATS[rand.gen_range(0..FORMATS.len())];
            (i, Layer::new(BenchBuffer { fd: &null, format }))
        })
        .collect::<Vec<_>>();
    let crtc = from_u32(50).unwrap();
    let provisioner = PlaneProvisioner::new(PlatformConfig::generic());

    c.bench_function("provision_64_layers_8_planes", |b| {
        b.iter(|| {
            let mut pool = planes.clone();
            let mut frame = layers
                .iter()
                .map(|(key, layer)| (*key, layer))
                .collect::<IndexMap<_, _>>();
            provisioner.provision(&mut frame, crtc, &mut pool).unwrap();
        });
    });

    c.bench_function("plane_layout_yvu420", |b| {
        b.iter(|| {
            plane_layout(
                1920,
                1081,
                1920,
                Fourcc::Yvu420,
                Usage::HW_FB,
                ChromaAlignment::default(),
            )
            .unwrap();
        });
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
