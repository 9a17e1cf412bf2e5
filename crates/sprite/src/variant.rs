//! The two art variants and the layer menu each one offers.
//!
//! A menu lists, per category, the layer ids the layer-selection model may
//! choose from together with a short description of each. The same menu
//! renders the selection prompt and validates the model's answer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::error::SpriteError;
use crate::table::LayerCategory;

/// One of the two exported costume sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtVariant {
    A,
    B,
}

struct Menu {
    base: &'static [(u32, &'static str)],
    expression: &'static [(u32, &'static str)],
    decoration: &'static [(u32, &'static str)],
    hair: &'static [(u32, &'static str)],
    example: &'static str,
}

const MENU_A: Menu = Menu {
    base: &[
        (1957, "睡衣，双手插在腰间"),
        (1956, "睡衣，两手自然下垂"),
        (1979, "便衣1，双手插在腰间"),
        (1978, "便衣1，两手自然下垂"),
        (1953, "校服，双手插在腰间"),
        (1952, "校服，两手自然下垂"),
        (1951, "便衣2，双手插在腰间"),
        (1950, "便衣2，两手自然下垂"),
    ],
    expression: &[
        (1996, "惊奇，闭着嘴（泪）"),
        (1995, "伤心，眼睛看向镜头（泪）"),
        (1994, "伤心，眼睛看向别处（泪）"),
        (1993, "叹气（泪）"),
        (1992, "欣慰（泪）"),
        (1991, "高兴（泪）"),
        (2009, "高兴，闭眼（泪）"),
        (1989, "失望，闭眼（泪）"),
        (1988, "叹气，眼睛看向别处（泪）"),
        (1987, "害羞，腼腆（泪）"),
        (1986, "惊奇，张着嘴（泪）"),
        (1976, "困惑，真挚"),
        (1975, "疑惑，愣住"),
        (1974, "愣住，焦急，真挚"),
        (1973, "愤怒，困惑"),
        (1972, "困惑，羞涩"),
        (1971, "寂寞，羞涩"),
        (1970, "真挚，寂寞，思考"),
        (1969, "困惑，愣住，羞涩"),
        (1968, "困惑，寂寞，羞涩"),
        (1967, "困惑"),
        (1966, "困惑，笑容，羞涩"),
        (1965, "笑容，困惑"),
        (1964, "笑容"),
        (1963, "笑容"),
        (1935, "紧张"),
        (1904, "嘿嘿嘿"),
        (1880, "达观"),
        (1856, "恐惧"),
        (1822, "严肃"),
        (1801, "超级不满"),
        (1768, "极度不满"),
        (1738, "孩子气"),
        (1714, "疑惑"),
        (1690, "愣住"),
        (1668, "窃笑2"),
        (1644, "窃笑"),
        (1620, "愤怒"),
        (1596, "困惑"),
        (1572, "思考"),
        (1548, "真挚"),
        (1528, "寂寞"),
        (1504, "羞涩2"),
        (1480, "羞涩"),
        (1455, "腼腆"),
        (1430, "焦急2"),
        (1399, "焦急"),
        (1368, "惊讶"),
        (1337, "愣住"),
        (1316, "笑容1"),
        (1292, "平静"),
    ],
    decoration: &[(1940, "叹气的装饰"), (1958, "腮红（有些害羞）")],
    hair: &[
        (1273, "穿便衣2时必选的图层"),
        (1959, "穿除便衣2时必选的图层"),
    ],
    example: "[1953, 1801, 1959]",
};

const MENU_B: Menu = Menu {
    base: &[
        (1718, "睡衣"),
        (1717, "便衣"),
        (1716, "校服"),
        (1715, "便衣2"),
    ],
    expression: &[
        (1755, "伤心（泪）"),
        (1754, "有些生气，指责（泪）"),
        (1753, "闭眼（泪）"),
        (1752, "害羞（泪）"),
        (1751, "失落（泪）"),
        (1750, "欣慰，高兴（泪）"),
        (1749, "高兴（泪）"),
        (1748, "欣慰，高兴，闭眼（泪）"),
        (1747, "惊奇（泪）"),
        (1787, "大哭"),
        (1765, "大哭2"),
        (1745, "高兴2（泪）"),
        (1733, "悲伤，害羞"),
        (1732, "撒娇，愤怒尖叫，眯眼"),
        (1731, "愤怒尖叫，认真，惊讶"),
        (1730, "愤怒尖叫，悲伤，认真"),
        (1729, "悲伤，撒娇，抬眼"),
        (1728, "悲伤，害羞，认真"),
        (1727, "惊讶，基础，抬眼"),
        (1726, "悲伤"),
        (1725, "悲伤，笑脸2，微笑"),
        (1724, "笑脸2，眯眼"),
        (1723, "悲伤"),
        (1722, "笑脸2，微笑"),
        (1721, "笑脸2"),
        (1704, "达观"),
        (1681, "认真脸2"),
        (1710, "超级生气"),
        (1641, "愤怒尖叫"),
        (1616, "抬眼，害羞"),
        (1712, "不满，哼哼唧唧2"),
        (1711, "不满，哼哼唧唧"),
        (1524, "认真"),
        (1505, "瞪大眼睛，惊讶"),
        (1475, "撒娇"),
        (1452, "眯眼"),
        (1429, "悲伤"),
        (1406, "害羞"),
        (1376, "惊讶"),
        (1352, "微笑"),
        (1329, "笑脸2"),
        (1306, "平静"),
    ],
    decoration: &[(1708, "不满时脸色阴沉的装饰"), (1719, "腮红（有些害羞）")],
    hair: &[(1261, "头发（必选）")],
    example: "[1718, 1475, 1261]",
};

impl ArtVariant {
    /// Base name of the exported table and layer PNGs.
    pub fn asset_name(self) -> &'static str {
        match self {
            Self::A => "ムラサメa",
            Self::B => "ムラサメb",
        }
    }

    /// Rows of the layer table holding the base bodies.
    pub fn base_rows(self) -> Range<usize> {
        match self {
            Self::A => 57..65,
            Self::B => 47..51,
        }
    }

    fn menu(self) -> &'static Menu {
        match self {
            Self::A => &MENU_A,
            Self::B => &MENU_B,
        }
    }

    /// Category of `id` according to this variant's menu.
    pub fn category_of(self, id: u32) -> Option<LayerCategory> {
        let menu = self.menu();
        let contains = |entries: &[(u32, &str)]| entries.iter().any(|(entry, _)| *entry == id);
        if contains(menu.base) {
            Some(LayerCategory::Base)
        } else if contains(menu.expression) {
            Some(LayerCategory::Expression)
        } else if contains(menu.decoration) {
            Some(LayerCategory::Decoration)
        } else if contains(menu.hair) {
            Some(LayerCategory::Hair)
        } else {
            None
        }
    }

    /// The system prompt for the layer-selection model.
    pub fn layer_prompt(self) -> String {
        let menu = self.menu();
        let line = |label: &str, entries: &[(u32, &str)]| {
            let items: Vec<String> = entries
                .iter()
                .map(|(id, description)| format!("{id}：{description}"))
                .collect();
            format!("{label} >> {}\n", items.join("；"))
        };

        let mut prompt = String::from(
            "你是一个立绘图层生成助手。用户会提供一个句子，你需要根据句子的情感来生成一张说话人的立绘所需的图层列表。你需要根据句子的感情来选择图层，供你参考的图层有：\n",
        );
        prompt.push_str(&line("基础人物", menu.base));
        prompt.push_str(&line("表情", menu.expression));
        prompt.push_str(&line("额外装饰", menu.decoration));
        prompt.push_str(&line("头发", menu.hair));
        prompt.push_str(
            "\n以上是你可以选择的图层，基础人物、表情、头发中必须各选一个，额外装饰可以多选，也可以都不选。但是你返回的图层顺序必须是基础人物在最前，之后是表情，之后是额外装饰，最后是头发。\n",
        );
        prompt.push_str(&format!(
            "返回请给出一个JSON列表，里面放上图层ID，例如\"{}\"。你不需要返回markdown格式的JSON，你也不需要加入```json这样的内容，你只需要返回纯文本即可。",
            menu.example
        ));
        prompt
    }

    /// Check a selection: one base, one expression, any decorations, one
    /// hair, in that order, all from this variant's menu.
    pub fn validate_selection(self, ids: &[u32]) -> Result<(), SpriteError> {
        let categories = ids
            .iter()
            .map(|&id| {
                self.category_of(id).ok_or_else(|| {
                    SpriteError::InvalidSelection(format!(
                        "layer {id} is not offered by variant {self}"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        match categories.as_slice() {
            [LayerCategory::Base, LayerCategory::Expression, decorations @ .., LayerCategory::Hair]
                if decorations.iter().all(|c| *c == LayerCategory::Decoration) =>
            {
                Ok(())
            }
            _ => Err(SpriteError::InvalidSelection(format!(
                "expected base, expression, decorations, hair; got {categories:?}"
            ))),
        }
    }
}

impl fmt::Display for ArtVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("a"),
            Self::B => f.write_str("b"),
        }
    }
}

impl FromStr for ArtVariant {
    type Err = SpriteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(Self::A),
            "b" => Ok(Self::B),
            _ => Err(SpriteError::UnknownVariant(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_variant() {
        assert_eq!("a".parse::<ArtVariant>().unwrap(), ArtVariant::A);
        assert_eq!(" B ".parse::<ArtVariant>().unwrap(), ArtVariant::B);
        assert!("c".parse::<ArtVariant>().is_err());
    }

    #[test]
    fn asset_names_and_rows() {
        assert_eq!(ArtVariant::A.asset_name(), "ムラサメa");
        assert_eq!(ArtVariant::B.base_rows(), 47..51);
        assert_eq!(ArtVariant::A.base_rows().len(), 8);
    }

    #[test]
    fn categories_from_menu() {
        let b = ArtVariant::B;
        assert_eq!(b.category_of(1717), Some(LayerCategory::Base));
        assert_eq!(b.category_of(1475), Some(LayerCategory::Expression));
        assert_eq!(b.category_of(1719), Some(LayerCategory::Decoration));
        assert_eq!(b.category_of(1261), Some(LayerCategory::Hair));
        assert_eq!(b.category_of(1957), None);
        assert_eq!(ArtVariant::A.category_of(1957), Some(LayerCategory::Base));
    }

    #[test]
    fn valid_selections() {
        let b = ArtVariant::B;
        assert!(b.validate_selection(&[1717, 1475, 1261]).is_ok());
        assert!(b.validate_selection(&[1718, 1406, 1719, 1708, 1261]).is_ok());
        assert!(b.validate_selection(&[1718, 1406, 1719, 1719, 1261]).is_ok());
        assert!(ArtVariant::A.validate_selection(&[1953, 1801, 1959]).is_ok());
    }

    #[test]
    fn invalid_selections() {
        let b = ArtVariant::B;
        // hair before expression
        assert!(b.validate_selection(&[1717, 1261, 1475]).is_err());
        // two bases
        assert!(b.validate_selection(&[1717, 1718, 1475, 1261]).is_err());
        // missing hair
        assert!(b.validate_selection(&[1717, 1475]).is_err());
        // id from the other variant
        assert!(b.validate_selection(&[1953, 1475, 1261]).is_err());
        assert!(b.validate_selection(&[]).is_err());
    }

    #[test]
    fn prompt_lists_every_category() {
        let prompt = ArtVariant::B.layer_prompt();
        assert!(prompt.contains("基础人物 >> 1718：睡衣；1717：便衣"));
        assert!(prompt.contains("头发 >> 1261：头发（必选）"));
        assert!(prompt.contains("[1718, 1475, 1261]"));
    }
}
