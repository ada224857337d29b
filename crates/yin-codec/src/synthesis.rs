//! 多相合成滤波器组 (ISO 11172-3 附录 A).
//!
//! 每次输入 32 个子带采样, 输出 32 个 PCM 采样:
//! 1. 矩阵运算: `V[i] = Σ cos((16 + i)(2k + 1)π / 64) · S[k]`, 写入 1024 项 V 缓冲头部
//! 2. 由 V 构造 512 项 U, 与合成窗口 D 逐项相乘
//! 3. 每个输出采样累加 16 项

use std::f64::consts::PI;
use std::sync::OnceLock;

/// 合成窗口前半部分 (D[0..=256] 乘以 65536)
const ENWINDOW: [i32; 257] = [
    0, -1, -1, -1, -1, -1, -1, -2, -2, -2, -2, -3,
    -3, -4, -4, -5, -5, -6, -7, -7, -8, -9, -10, -11,
    -13, -14, -16, -17, -19, -21, -24, -26, -29, -31, -35, -38,
    -41, -45, -49, -53, -58, -63, -68, -73, -79, -85, -91, -97,
    -104, -111, -117, -125, -132, -139, -147, -154, -161, -169, -176, -183,
    -190, -196, -202, -208, 213, 218, 222, 225, 227, 228, 228, 227,
    224, 221, 215, 208, 200, 189, 177, 163, 146, 127, 106, 83,
    57, 29, -2, -36, -72, -111, -153, -197, -244, -294, -347, -401,
    -459, -519, -581, -645, -711, -779, -848, -919, -991, -1064, -1137, -1210,
    -1283, -1356, -1428, -1498, -1567, -1634, -1698, -1759, -1817, -1870, -1919, -1962,
    -2001, -2032, -2057, -2075, -2085, -2087, -2080, -2063, 2037, 2000, 1952, 1893,
    1822, 1739, 1644, 1535, 1414, 1280, 1131, 970, 794, 605, 402, 185,
    -45, -288, -545, -814, -1095, -1388, -1692, -2006, -2330, -2663, -3004, -3351,
    -3705, -4063, -4425, -4788, -5153, -5517, -5879, -6237, -6589, -6935, -7271, -7597,
    -7910, -8209, -8491, -8755, -8998, -9219, -9416, -9585, -9727, -9838, -9916, -9959,
    -9966, -9935, -9863, -9750, -9592, -9389, -9139, -8840, -8492, -8092, -7640, -7134,
    6574, 5959, 5288, 4561, 3776, 2935, 2037, 1082, 70, -998, -2122, -3300,
    -4533, -5818, -7154, -8540, -9975, -11455, -12980, -14548, -16155, -17799, -19478, -21189,
    -22929, -24694, -26482, -28289, -30112, -31947, -33791, -35640, -37489, -39336, -41176, -43006,
    -44821, -46617, -48390, -50137, -51853, -53534, -55178, -56778, -58333, -59838, -61289, -62684,
    -64019, -65290, -66494, -67629, -68692, -69679, -70590, -71420, -72169, -72835, -73415, -73908,
    -74313, -74630, -74856, -74992, 75038,
];

/// 合成窗口 D[0..512]
static SYNTH_WINDOW: OnceLock<[f32; 512]> = OnceLock::new();

/// 矩阵运算系数 [64][32]
static SYNTH_MATRIX: OnceLock<Vec<[f32; 32]>> = OnceLock::new();

fn synth_window() -> &'static [f32; 512] {
    SYNTH_WINDOW.get_or_init(|| {
        let mut window = [0.0f32; 512];
        for (i, &v) in ENWINDOW.iter().enumerate() {
            window[i] = v as f32 / 65536.0;
        }
        // 后半部分关于 256 反对称, 每 64 项的边界点对称
        for i in 1..256 {
            window[512 - i] = if i % 64 == 0 { window[i] } else { -window[i] };
        }
        window
    })
}

fn synth_matrix() -> &'static [[f32; 32]] {
    SYNTH_MATRIX.get_or_init(|| {
        (0..64)
            .map(|i| {
                let mut row = [0.0f32; 32];
                for (k, c) in row.iter_mut().enumerate() {
                    *c = ((16 + i) as f64 * (2 * k + 1) as f64 * PI / 64.0).cos() as f32;
                }
                row
            })
            .collect()
    })
}

/// 单声道合成滤波器状态
#[derive(Debug, Clone)]
pub struct SynthesisFilter {
    /// V 缓冲 (FIFO, 每次移位 64 项)
    v: [f32; 1024],
}

impl Default for SynthesisFilter {
    fn default() -> Self {
        Self { v: [0.0; 1024] }
    }
}

impl SynthesisFilter {
    /// 创建零状态滤波器
    pub fn new() -> Self {
        Self::default()
    }

    /// 清空历史 (seek 之后调用)
    pub fn reset(&mut self) {
        self.v.fill(0.0);
    }

    /// 合成一个时隙: 32 个子带采样 -> 32 个 PCM 采样
    pub fn synthesize(&mut self, subbands: &[f32; 32], pcm: &mut [f32; 32]) {
        let window = synth_window();
        let matrix = synth_matrix();

        self.v.copy_within(0..960, 64);
        for (i, row) in matrix.iter().enumerate() {
            self.v[i] = row.iter().zip(subbands).map(|(c, s)| c * s).sum();
        }

        for (j, out) in pcm.iter_mut().enumerate() {
            let mut sum = 0.0f32;
            for i in 0..8 {
                let lo = i * 64 + j;
                let hi = lo + 32;
                sum += self.v[i * 128 + j] * window[lo];
                sum += self.v[i * 128 + 96 + j] * window[hi];
            }
            *out = sum;
        }
    }
}
