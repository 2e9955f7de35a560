// Element-wise kernels over device buffers.
//
// Each kernel records its launch on the owning heap's stream before touching
// device memory. Kernels that produce a host-visible result (compare)
// synchronize before returning it.

use rand::Rng;

use crate::backend::BinaryOp;
use crate::cpu::{binary_into, binary_scalar_into, compare_into, fill_uniform};

use super::memory::DeviceBuffer;

pub fn fill(dst: &mut DeviceBuffer, value: f32) {
    dst.heap().stream().launch("fill", dst.len());
    dst.device_slice_mut().fill(value);
}

pub fn fill_uniform_rand<R: Rng + ?Sized>(dst: &mut DeviceBuffer, rng: &mut R) {
    dst.heap().stream().launch("fill_uniform", dst.len());
    fill_uniform(dst.device_slice_mut(), rng);
}

/// Device-to-device copy of `count` elements.
pub fn copy(
    dst: &mut DeviceBuffer,
    dst_offset: usize,
    src: &DeviceBuffer,
    src_offset: usize,
    count: usize,
) {
    dst.heap().stream().launch("memcpy_dtod", count);
    dst.device_slice_mut()[dst_offset..dst_offset + count]
        .copy_from_slice(&src.device_slice()[src_offset..src_offset + count]);
}

/// Copy of `count` elements between two windows of one buffer.
pub fn copy_within(buf: &mut DeviceBuffer, dst_offset: usize, src_offset: usize, count: usize) {
    buf.heap().stream().launch("memcpy_dtod", count);
    buf.device_slice_mut()
        .copy_within(src_offset..src_offset + count, dst_offset);
}

pub fn binary(
    op: BinaryOp,
    out: &mut DeviceBuffer,
    a: &DeviceBuffer,
    a_offset: usize,
    b: &DeviceBuffer,
    b_offset: usize,
    count: usize,
) {
    out.heap().stream().launch(op.name(), count);
    binary_into(
        op,
        &mut out.device_slice_mut()[..count],
        &a.device_slice()[a_offset..a_offset + count],
        &b.device_slice()[b_offset..b_offset + count],
    );
}

#[allow(clippy::too_many_arguments)]
pub fn binary_scalar(
    op: BinaryOp,
    out: &mut DeviceBuffer,
    a: &DeviceBuffer,
    a_offset: usize,
    scalar: &DeviceBuffer,
    scalar_offset: usize,
    count: usize,
    scalar_first: bool,
) {
    out.heap().stream().launch(op.name(), count);
    binary_scalar_into(
        op,
        &mut out.device_slice_mut()[..count],
        &a.device_slice()[a_offset..a_offset + count],
        scalar.device_slice()[scalar_offset],
        scalar_first,
    );
}

/// Exact comparison of two device windows. The flag is read back to the
/// host, so the stream is synchronized first.
pub fn compare(
    a: &DeviceBuffer,
    a_offset: usize,
    b: &DeviceBuffer,
    b_offset: usize,
    count: usize,
) -> bool {
    let stream = a.heap().stream();
    stream.launch("compare", count);
    stream.synchronize();
    compare_into(
        &a.device_slice()[a_offset..a_offset + count],
        &b.device_slice()[b_offset..b_offset + count],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::cuda::memory::DeviceHeap;

    #[test]
    fn test_kernels_record_launches() {
        let heap = DeviceHeap::with_config(&DeviceConfig::with_memory_limit(1 << 16));
        let a = heap.upload(&[1.0, 2.0, 3.0]).unwrap();
        let b = heap.upload(&[4.0, 5.0, 6.0]).unwrap();
        let mut out = heap.alloc(3).unwrap();
        heap.stream().synchronize();

        binary(BinaryOp::Add, &mut out, &a, 0, &b, 0, 3);
        assert_eq!(heap.stream().pending(), 1);
        assert_eq!(out.download().unwrap(), vec![5.0, 7.0, 9.0]);

        fill(&mut out, 2.0);
        assert!(compare(&out, 1, &out, 0, 2));
        assert_eq!(heap.stream().pending(), 0);
    }

    #[test]
    fn test_copy_and_scalar() {
        let heap = DeviceHeap::with_config(&DeviceConfig::with_memory_limit(1 << 16));
        let src = heap.upload(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        let mut dst = heap.alloc(2).unwrap();
        copy(&mut dst, 0, &src, 2, 2);
        assert_eq!(dst.download().unwrap(), vec![3.0, 4.0]);

        let mut buf = heap.upload(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        let launched = heap.stream().launched();
        copy_within(&mut buf, 0, 2, 2);
        assert_eq!(heap.stream().launched(), launched + 1);
        assert_eq!(buf.download().unwrap(), vec![3.0, 4.0, 3.0, 4.0]);

        let s = heap.upload(&[10.0]).unwrap();
        let mut out = heap.alloc(4).unwrap();
        binary_scalar(BinaryOp::Div, &mut out, &src, 0, &s, 0, 4, true);
        assert_eq!(out.download().unwrap(), vec![10.0, 5.0, 10.0 / 3.0, 2.5]);
    }
}
