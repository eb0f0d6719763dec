use criterion::{criterion_group, criterion_main};
use rand::Rng;

use loose_octree::aabb_tree::AabbOctree;
use loose_octree::geom::{Aabb, Vec3};
use loose_octree::point_tree::PointOctree;

fn criterion_benchmark(c: &mut criterion::Criterion) {
    let mut rng = rand::thread_rng();
    let world_size = 512.;

    let mut aabb_tree: AabbOctree<u32> = AabbOctree::new(world_size, Vec3::ZERO, 1.0, 1.5).unwrap();
    for i in 0..50_000u32 {
        let centre = Vec3::new(
            rng.gen_range(-world_size / 2.0..world_size / 2.0),
            rng.gen_range(-world_size / 2.0..world_size / 2.0),
            rng.gen_range(-world_size / 2.0..world_size / 2.0),
        );
        aabb_tree.add(i, Aabb::cube(centre, 1.0));
    }

    c.bench_function("aabb_tree add", |b| {
        let mut next_key = 50_000u32;
        b.iter(|| {
            let centre = Vec3::new(
                rng.gen_range(-world_size / 2.0..world_size / 2.0),
                rng.gen_range(-world_size / 2.0..world_size / 2.0),
                rng.gen_range(-world_size / 2.0..world_size / 2.0),
            );
            aabb_tree.add(next_key, Aabb::cube(centre, 1.0));
            next_key += 1;
        });
    });

    c.bench_function("aabb_tree get_intersecting", |b| {
        b.iter(|| {
            let centre = Vec3::new(
                rng.gen_range(-world_size / 2.0..world_size / 2.0),
                rng.gen_range(-world_size / 2.0..world_size / 2.0),
                rng.gen_range(-world_size / 2.0..world_size / 2.0),
            );
            aabb_tree.get_intersecting(&Aabb::cube(centre, 10.0), None)
        });
    });

    c.bench_function("aabb_tree remove", |b| {
        let mut next_key = 0u32;
        b.iter(|| {
            aabb_tree.remove(&next_key);
            next_key = next_key.wrapping_add(1) % 50_000;
        });
    });

    let mut point_tree: PointOctree<u32> = PointOctree::new(world_size, Vec3::ZERO, 0.5).unwrap();
    for i in 0..50_000u32 {
        let p = Vec3::new(
            rng.gen_range(-world_size / 2.0..world_size / 2.0),
            rng.gen_range(-world_size / 2.0..world_size / 2.0),
            rng.gen_range(-world_size / 2.0..world_size / 2.0),
        );
        point_tree.add(i, p);
    }

    c.bench_function("point_tree get_nearby", |b| {
        b.iter(|| {
            let centre = Vec3::new(
                rng.gen_range(-world_size / 2.0..world_size / 2.0),
                rng.gen_range(-world_size / 2.0..world_size / 2.0),
                rng.gen_range(-world_size / 2.0..world_size / 2.0),
            );
            point_tree.get_nearby(centre, 10.0, None)
        });
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
