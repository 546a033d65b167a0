//! SD 数据源设备
//!
//! SPI 模式驱动的 SD 类块设备，作为搬运的数据源。只实现读路径：
//! 卡对分配器来说是只读介质，写和擦除都不支持。
//!
//! 总线的位级驱动不在这里：通过 [`SpiBus`] trait 注入。

use crate::device::{FlashDevice, StatusFlags};
use crate::error::{Error, ErrorKind, Result};
use byteorder::{BigEndian, ByteOrder};

/// SPI 命令字节（SPI 模式命令集的子集）
const CMD_GO_IDLE_STATE: u8 = 0;
const CMD_SEND_OP_COND: u8 = 1;
const CMD_READ_SINGLE_BLOCK: u8 = 17;

/// R1 响应
const RESPONSE_OK: u8 = 0x00;
const RESPONSE_IN_IDLE_STATE: u8 = 0x01;

/// 固定 CRC 字节，只有 GO_IDLE_STATE 校验它，其余命令在 SPI 模式下忽略
const COMMAND_CRC: u8 = 0x95;

/// 单块读的数据起始令牌
const DATA_START_TOKEN: u8 = 0xFE;

/// 每条命令的重试上限
const COMMAND_RETRY_LIMIT: u32 = 255;

/// SD 传输块大小（字节）
const SD_BLOCK_SIZE: u32 = 512;

/// SPI 总线接口
///
/// 实现方负责位级时序。所有方法都是同步阻塞的。
pub trait SpiBus {
    /// 全双工传输
    ///
    /// 时钟 `max(tx.len(), rx.len())` 字节：`tx` 耗尽后移出 0xFF，
    /// `rx` 装满后丢弃多余的入站字节。
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()>;

    /// 拉低片选
    fn assert_cs(&mut self);

    /// 释放片选
    fn deassert_cs(&mut self);
}

/// 构造 6 字节命令帧：命令号、4 个大端参数字节、固定 CRC
fn command_frame(cmd: u8, arg: u32) -> [u8; 6] {
    let mut frame = [0u8; 6];
    frame[0] = 0x40 | cmd;
    BigEndian::write_u32(&mut frame[1..5], arg);
    frame[5] = COMMAND_CRC;
    frame
}

/// 发送一条命令并取回 R1 响应
///
/// 响应在命令帧之后的 8 个字节里轮询：第一个非 0xFF 字节就是响应，
/// 8 个字节全是 0xFF 则本次无响应（返回 0xFF）。
fn command_once<B: SpiBus>(bus: &mut B, cmd: u8, arg: u32) -> Result<u8> {
    bus.transfer(&command_frame(cmd, arg), &mut [])?;

    let mut window = [0xFFu8; 8];
    bus.transfer(&[], &mut window)?;

    Ok(window.iter().copied().find(|b| *b != 0xFF).unwrap_or(0xFF))
}

/// 重试发送命令直到得到期望的响应（不动片选）
fn command_raw<B: SpiBus>(bus: &mut B, cmd: u8, arg: u32, expected: u8) -> Result<()> {
    for _ in 0..COMMAND_RETRY_LIMIT {
        if command_once(bus, cmd, arg)? == expected {
            return Ok(());
        }
    }

    log::warn!(
        "[SD] cmd {} failed after {} attempts",
        cmd,
        COMMAND_RETRY_LIMIT
    );
    Err(Error::new(
        ErrorKind::RetryExhausted,
        "sd command retry limit reached",
    ))
}

/// 片选包住的命令发送
fn command<B: SpiBus>(bus: &mut B, cmd: u8, arg: u32, expected: u8) -> Result<()> {
    bus.assert_cs();
    let result = command_raw(bus, cmd, arg, expected);
    bus.deassert_cs();
    result
}

/// 单块读事务：命令、等数据令牌、块数据、丢弃 2 字节数据 CRC
fn read_block_raw<B: SpiBus>(bus: &mut B, addr: u32, block: &mut [u8]) -> Result<()> {
    command_raw(bus, CMD_READ_SINGLE_BLOCK, addr, RESPONSE_OK)?;

    let mut token = [0xFFu8];
    let mut seen = false;
    for _ in 0..COMMAND_RETRY_LIMIT {
        bus.transfer(&[], &mut token)?;
        if token[0] == DATA_START_TOKEN {
            seen = true;
            break;
        }
    }
    if !seen {
        log::warn!("[SD] no data token for block at {:#x}", addr);
        return Err(Error::new(
            ErrorKind::RetryExhausted,
            "sd data token timed out",
        ));
    }

    bus.transfer(&[], block)?;
    let mut crc = [0u8; 2];
    bus.transfer(&[], &mut crc)?;
    Ok(())
}

/// SPI 模式的 SD 数据源
///
/// `read` 按 512 字节块事务拼出任意地址、任意长度的读取。
pub struct SdCard<B: SpiBus> {
    bus: B,
    total_size: u32,
    initialized: bool,
    block: [u8; SD_BLOCK_SIZE as usize],
}

impl<B: SpiBus> SdCard<B> {
    /// 创建 SD 数据源
    ///
    /// # 参数
    ///
    /// * `bus` - SPI 总线
    /// * `total_size` - 卡容量（字节），只用于 `total_size()` 汇报
    pub fn new(bus: B, total_size: u32) -> Self {
        Self {
            bus,
            total_size,
            initialized: false,
            block: [0; SD_BLOCK_SIZE as usize],
        }
    }
}

impl<B: SpiBus> FlashDevice for SdCard<B> {
    /// 初始化卡：上电时序加 SPI 模式切换
    ///
    /// 片选释放状态下先送至少 10 个空字节（74+ 个时钟让卡上电稳定），
    /// 然后 GO_IDLE_STATE 进入 SPI 模式（期望空闲响应），
    /// SEND_OP_COND 等待卡就绪（期望 OK 响应）。
    fn init(&mut self) -> Result<()> {
        self.bus.deassert_cs();
        self.bus.transfer(&[0xFFu8; 10], &mut [])?;

        command(
            &mut self.bus,
            CMD_GO_IDLE_STATE,
            0,
            RESPONSE_IN_IDLE_STATE,
        )?;
        command(&mut self.bus, CMD_SEND_OP_COND, 0, RESPONSE_OK)?;

        self.initialized = true;
        log::info!("[SD] card initialized, {} bytes", self.total_size);
        Ok(())
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let mut pos = 0usize;
        while pos < buf.len() {
            let cur = addr + pos as u32;
            let block_start = cur & !(SD_BLOCK_SIZE - 1);
            let offset = (cur - block_start) as usize;

            self.bus.assert_cs();
            let result = read_block_raw(&mut self.bus, block_start, &mut self.block);
            self.bus.deassert_cs();
            result?;

            let n = (SD_BLOCK_SIZE as usize - offset).min(buf.len() - pos);
            buf[pos..pos + n].copy_from_slice(&self.block[offset..offset + n]);
            pos += n;
        }
        Ok(())
    }

    fn write(&mut self, _addr: u32, _buf: &[u8]) -> Result<()> {
        Err(Error::new(
            ErrorKind::Unsupported,
            "sd source is read-only",
        ))
    }

    fn erase(&mut self, _addr: u32, _size: u32) -> Result<()> {
        Err(Error::new(
            ErrorKind::Unsupported,
            "sd source is read-only",
        ))
    }

    fn enable_mapped_mode(&mut self) -> Result<()> {
        Ok(())
    }

    fn disable_mapped_mode(&mut self) -> Result<()> {
        Ok(())
    }

    /// 源设备没有擦除概念，按字节粒度汇报
    fn smallest_erase_size(&self) -> u32 {
        1
    }

    fn is_presented(&self) -> bool {
        self.initialized
    }

    fn total_size(&self) -> u32 {
        self.total_size
    }

    fn read_status(&mut self) -> Result<StatusFlags> {
        Ok(StatusFlags::empty())
    }

    fn name(&self) -> &'static str {
        "sd"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::VecDeque;
    use alloc::vec::Vec;

    /// 脚本化总线：记录出站字节，入站字节从队列取，取空补 0xFF
    struct ScriptedBus {
        tx_log: Vec<u8>,
        rx_queue: VecDeque<u8>,
        cs_asserted: bool,
        tx_len_at_first_assert: Option<usize>,
    }

    impl ScriptedBus {
        fn new() -> Self {
            Self {
                tx_log: Vec::new(),
                rx_queue: VecDeque::new(),
                cs_asserted: false,
                tx_len_at_first_assert: None,
            }
        }

        fn queue(&mut self, bytes: &[u8]) {
            self.rx_queue.extend(bytes.iter().copied());
        }

        /// 排入一个完整的 R1 响应窗口（8 字节）
        fn queue_response(&mut self, response: u8) {
            self.queue(&[0xFF, response, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        }
    }

    impl SpiBus for ScriptedBus {
        fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
            self.tx_log.extend_from_slice(tx);
            for b in rx.iter_mut() {
                *b = self.rx_queue.pop_front().unwrap_or(0xFF);
            }
            Ok(())
        }

        fn assert_cs(&mut self) {
            if self.tx_len_at_first_assert.is_none() {
                self.tx_len_at_first_assert = Some(self.tx_log.len());
            }
            self.cs_asserted = true;
        }

        fn deassert_cs(&mut self) {
            self.cs_asserted = false;
        }
    }

    #[test]
    fn test_init_sequence() {
        let mut bus = ScriptedBus::new();
        bus.queue_response(RESPONSE_IN_IDLE_STATE);
        bus.queue_response(RESPONSE_OK);

        let mut card = SdCard::new(bus, 1024 * 1024);
        card.init().unwrap();
        assert!(card.is_presented());

        // 前 10 个空字节在第一次拉低片选之前送出
        assert_eq!(card.bus.tx_len_at_first_assert, Some(10));
        assert_eq!(&card.bus.tx_log[..10], &[0xFFu8; 10]);

        // GO_IDLE_STATE 命令帧：0x40、4 个大端参数字节、固定 CRC
        assert_eq!(&card.bus.tx_log[10..16], &[0x40, 0, 0, 0, 0, 0x95]);
        // SEND_OP_COND 紧随其后
        assert_eq!(&card.bus.tx_log[16..22], &[0x41, 0, 0, 0, 0, 0x95]);

        // 事务结束后片选已释放
        assert!(!card.bus.cs_asserted);
    }

    #[test]
    fn test_command_retry_exhaustion() {
        // 卡不应答：响应窗口永远是 0xFF
        let bus = ScriptedBus::new();
        let mut card = SdCard::new(bus, 1024 * 1024);

        let err = card.init().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RetryExhausted);
        assert!(!card.is_presented());
        assert!(!card.bus.cs_asserted);
    }

    fn queue_block_read(bus: &mut ScriptedBus, pattern: impl Fn(usize) -> u8) {
        bus.queue_response(RESPONSE_OK);
        // 两个轮询周期后出现数据令牌
        bus.queue(&[0xFF, 0xFF, DATA_START_TOKEN]);
        let data: Vec<u8> = (0..512).map(pattern).collect();
        bus.queue(&data);
        // 数据 CRC（被丢弃）
        bus.queue(&[0xAA, 0xBB]);
    }

    #[test]
    fn test_read_within_one_block() {
        let mut bus = ScriptedBus::new();
        queue_block_read(&mut bus, |i| i as u8);

        let mut card = SdCard::new(bus, 1024 * 1024);
        let mut buf = [0u8; 16];
        card.read(100, &mut buf).unwrap();

        let expected: Vec<u8> = (100..116).map(|i| i as u8).collect();
        assert_eq!(&buf[..], &expected[..]);

        // 读命令的参数是块起始地址（大端）
        let cmd_at = card.bus.tx_log.len() - 6;
        assert_eq!(&card.bus.tx_log[cmd_at..], &[0x51, 0, 0, 0, 0, 0x95]);
    }

    #[test]
    fn test_read_spans_block_boundary() {
        let mut bus = ScriptedBus::new();
        queue_block_read(&mut bus, |i| i as u8);
        queue_block_read(&mut bus, |i| (i as u8).wrapping_add(1));

        let mut card = SdCard::new(bus, 1024 * 1024);
        let mut buf = [0u8; 200];
        card.read(400, &mut buf).unwrap();

        // 前 112 字节来自第一个块的尾部，其余来自第二个块
        for (i, b) in buf.iter().enumerate() {
            let expected = if i < 112 {
                (400 + i) as u8
            } else {
                ((i - 112) as u8).wrapping_add(1)
            };
            assert_eq!(*b, expected, "mismatch at offset {}", i);
        }
    }

    #[test]
    fn test_write_and_erase_unsupported() {
        let bus = ScriptedBus::new();
        let mut card = SdCard::new(bus, 1024 * 1024);

        assert_eq!(
            card.write(0, &[0u8; 4]).unwrap_err().kind(),
            ErrorKind::Unsupported
        );
        assert_eq!(card.erase(0, 512).unwrap_err().kind(), ErrorKind::Unsupported);
    }
}
