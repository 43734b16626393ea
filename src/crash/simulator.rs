//! CrashSimulator 核心实现

use bitflags::bitflags;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::disk::{BlockStatus, CorruptMode, VirtualDisk};
use crate::error::{Error, ErrorKind, Result};
use crate::journal::Journal;

bitflags! {
    /// 允许随机选择的注入点集合
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CrashSites: u8 {
        /// 日志 flush 之前
        const PRE_LOG = 0b001;
        /// 日志 flush 之后、磁盘副作用之前
        const POST_LOG = 0b010;
        /// 磁盘副作用进行到第 k 块之后
        const MID_COMMIT = 0b100;
    }
}

/// 一次待触发的崩溃
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashPoint {
    /// 在事务条目 flush 之前崩溃
    PreLog,
    /// 在条目 flush 之后、任何磁盘副作用之前崩溃
    PostLog,
    /// 在写完 `after_blocks` 个块之后崩溃
    MidCommit {
        /// 崩溃前允许完成的块写入数
        after_blocks: u32,
    },
}

/// 种子化的崩溃注入器
///
/// 一次只装填一个崩溃点；触发后进入 crashed 状态，
/// 后续操作不再被打断，直到 [`reset`](CrashSimulator::reset)。
#[derive(Debug)]
pub struct CrashSimulator {
    /// 装填中的崩溃点
    armed: Option<CrashPoint>,
    /// 是否已触发（锁存，reset 前不清除）
    crashed: bool,
    /// 种子化随机源
    rng: SmallRng,
    /// 累计触发次数
    fired: u32,
}

impl CrashSimulator {
    /// 创建指定种子的模拟器
    pub fn new(seed: u64) -> Self {
        Self {
            armed: None,
            crashed: false,
            rng: SmallRng::seed_from_u64(seed),
            fired: 0,
        }
    }

    /// 装填一个确定的崩溃点（覆盖之前的装填）
    pub fn arm(&mut self, point: CrashPoint) {
        log::debug!("[CRASH] arm {:?}", point);
        self.armed = Some(point);
    }

    /// 从允许的注入点中随机装填一个
    ///
    /// mid-commit 的 k 从 `0..max_blocks` 均匀抽取。
    ///
    /// # 错误
    ///
    /// - `ErrorKind::InvalidInput` - `sites` 为空，或选中
    ///   mid-commit 时 `max_blocks` 为 0
    pub fn arm_random(&mut self, sites: CrashSites, max_blocks: u32) -> Result<CrashPoint> {
        let candidates: [(CrashSites, bool); 3] = [
            (CrashSites::PRE_LOG, sites.contains(CrashSites::PRE_LOG)),
            (CrashSites::POST_LOG, sites.contains(CrashSites::POST_LOG)),
            (CrashSites::MID_COMMIT, sites.contains(CrashSites::MID_COMMIT)),
        ];
        let allowed: alloc::vec::Vec<CrashSites> = candidates
            .iter()
            .filter(|(_, on)| *on)
            .map(|(site, _)| *site)
            .collect();
        if allowed.is_empty() {
            return Err(Error::new(ErrorKind::InvalidInput, "No crash sites enabled"));
        }

        let site = allowed[self.rng.gen_range(0..allowed.len())];
        let point = if site == CrashSites::PRE_LOG {
            CrashPoint::PreLog
        } else if site == CrashSites::POST_LOG {
            CrashPoint::PostLog
        } else {
            if max_blocks == 0 {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "Mid-commit crash requires max_blocks > 0",
                ));
            }
            CrashPoint::MidCommit {
                after_blocks: self.rng.gen_range(0..max_blocks),
            }
        };
        self.arm(point);
        Ok(point)
    }

    /// 清除装填和 crashed 状态（模拟重启）
    pub fn reset(&mut self) {
        self.armed = None;
        self.crashed = false;
    }

    /// 当前装填的崩溃点
    pub fn armed(&self) -> Option<CrashPoint> {
        self.armed
    }

    /// 是否已触发过崩溃且尚未 reset
    pub fn has_crashed(&self) -> bool {
        self.crashed
    }

    /// 累计触发次数（跨 reset 保留）
    pub fn fired(&self) -> u32 {
        self.fired
    }

    /// pre-log 注入点：装填了 PreLog 时触发
    pub fn fire_pre_log(&mut self) -> bool {
        self.fire_if(matches!(self.armed, Some(CrashPoint::PreLog)), "pre-log")
    }

    /// post-log 注入点：装填了 PostLog 时触发
    pub fn fire_post_log(&mut self) -> bool {
        self.fire_if(matches!(self.armed, Some(CrashPoint::PostLog)), "post-log")
    }

    /// mid-commit 注入点：已写块数达到装填的 k 时触发
    ///
    /// 文件系统在每次块写入之前用当前已写块数调用一次。
    pub fn fire_mid_commit(&mut self, written: u32) -> bool {
        let hit = matches!(
            self.armed,
            Some(CrashPoint::MidCommit { after_blocks }) if written >= after_blocks
        );
        self.fire_if(hit, "mid-commit")
    }

    // =========================================================================
    // 崩溃后的破坏
    // =========================================================================

    /// 随机挑一个 Used 块并翻转其中一个随机位
    ///
    /// 没有 Used 块时返回 None。
    pub fn corrupt_random_used_block(&mut self, disk: &mut VirtualDisk) -> Result<Option<u32>> {
        let used: alloc::vec::Vec<u32> = (0..disk.total_blocks())
            .filter(|&b| disk.block_status(b) == Some(BlockStatus::Used))
            .collect();
        if used.is_empty() {
            return Ok(None);
        }

        let block = used[self.rng.gen_range(0..used.len())];
        let offset = self.rng.gen_range(0..disk.block_size());
        let mask = 1u8 << self.rng.gen_range(0..8u8);
        disk.corrupt(block, CorruptMode::FlipByte { offset, mask })?;
        Ok(Some(block))
    }

    /// 破坏指定块
    pub fn corrupt_block(&mut self, disk: &mut VirtualDisk, block: u32, mode: CorruptMode) -> Result<()> {
        disk.corrupt(block, mode)
    }

    /// 翻转一条日志记录中的一个随机位
    pub fn corrupt_journal_record(&mut self, journal: &mut Journal, index: usize) -> Result<()> {
        let offset = self.rng.gen_range(0..u16::MAX as usize);
        let mask = 1u8 << self.rng.gen_range(0..8u8);
        journal.corrupt_record(index, offset, mask)
    }

    fn fire_if(&mut self, hit: bool, site: &str) -> bool {
        if hit {
            log::info!("[CRASH] fired at {}", site);
            self.armed = None;
            self.crashed = true;
            self.fired += 1;
        }
        hit
    }
}
